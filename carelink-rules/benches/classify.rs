use criterion::{Criterion, black_box, criterion_group, criterion_main};

use carelink_core::{Language, SessionId, Utterance};
use carelink_policy::testing::sample_snapshot;
use carelink_rules::classify;
use carelink_session::SessionContext;

fn utterance(text: &str) -> Utterance {
    Utterance::new("u-bench", "s-bench", text, Language::Zh, 0.92)
}

fn bench_classify(c: &mut Criterion) {
    let policy = sample_snapshot();
    let view = SessionContext::new(SessionId::new("s-bench")).view(chrono::Utc::now());

    // The emergency tier carries a 30 ms budget; in practice a hit is a
    // handful of substring scans and lands in microseconds.
    c.bench_function("emergency_tier_hit", |b| {
        let utt = utterance("救命 我突然很不舒服");
        b.iter(|| classify(black_box(&utt), black_box(&policy), black_box(&view)));
    });

    c.bench_function("emergency_tier_long_sentence", |b| {
        let mut text = "今天天气很好我在阳台坐了一会儿然后".repeat(8);
        text.push_str("觉得不舒服");
        let utt = utterance(&text);
        b.iter(|| classify(black_box(&utt), black_box(&policy), black_box(&view)));
    });

    c.bench_function("smart_home_direct", |b| {
        let utt = utterance("把客厅的灯调亮一点");
        b.iter(|| classify(black_box(&utt), black_box(&policy), black_box(&view)));
    });

    c.bench_function("fallback_route_to_llm", |b| {
        let utt = utterance("今天讲个笑话吧");
        b.iter(|| classify(black_box(&utt), black_box(&policy), black_box(&view)));
    });
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
