//! User-visible phrase table.
//!
//! Every deny is a single calm sentence in the user's language; emergencies
//! always get a reassuring acknowledgement regardless of fan-out outcome.

use carelink_core::{DenyReason, Language};

/// What the response needs to say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phrase {
    EmergencyAck,
    ElevationAck,
    Greeting,
    ExecutedOk,
    MoveAck,
    CallAck,
    ChatFallback,
    ConfirmPrompt,
    Busy,
    Reassure,
    RejectLowConfidence,
    RejectPolicy,
    Draining,
    Deny(DenyReason),
}

impl Phrase {
    /// The phrase text in the given language.
    #[must_use]
    pub fn text(self, language: Language) -> String {
        match self {
            Self::EmergencyAck => tr(
                language,
                "已为您联系家人，请保持冷静，我在您身边。",
                "I am contacting your family now. Stay calm, I am right here with you.",
                "已經幫你聯絡家人，唔使驚，我喺度陪住你。",
            ),
            Self::ElevationAck => tr(
                language,
                "我有点担心您，已经请护理人员来看看您。",
                "I am a little worried about you, so I have asked your caregiver to check in.",
                "我有啲擔心你，已經請咗護理員嚟睇下你。",
            ),
            Self::Greeting => tr(language, "哎，我在呢。", "Yes, I am here.", "喂，我喺度。"),
            Self::ExecutedOk => tr(
                language,
                "好的，已经帮您办好了。",
                "Done, all taken care of.",
                "好喇，幫你搞掂咗。",
            ),
            Self::MoveAck => tr(
                language,
                "好的，这就带您过去。",
                "Alright, let me take you there.",
                "好呀，而家帶你過去。",
            ),
            Self::CallAck => tr(
                language,
                "好的，正在为您拨打电话。",
                "Alright, placing the call now.",
                "好呀，而家幫你打電話。",
            ),
            Self::ChatFallback => tr(
                language,
                "我在听呢，您想聊点什么？",
                "I am listening. What would you like to talk about?",
                "我喺度聽緊，你想傾啲咩呀？",
            ),
            Self::ConfirmPrompt => tr(
                language,
                "这个操作需要确认，请再说一次“确认”。",
                "This action needs a confirmation. Please say \"confirm\".",
                "呢個操作要確認，麻煩你講多次「確認」。",
            ),
            Self::Busy => tr(
                language,
                "现在有点忙，请稍后再试一次。",
                "Things are a bit busy right now, please try again in a moment.",
                "而家有啲忙，遲啲再試下吖。",
            ),
            Self::Reassure => tr(
                language,
                "这个操作暂时没有成功，我已经通知家人来帮忙。",
                "That did not go through just now; I have let your family know so they can help.",
                "今次未搞得掂，我已經通知咗屋企人嚟幫手。",
            ),
            Self::RejectLowConfidence => tr(
                language,
                "抱歉，我没有听清楚，请再说一遍。",
                "Sorry, I did not catch that. Could you say it again?",
                "唔好意思，我聽唔清楚，可唔可以再講一次？",
            ),
            Self::RejectPolicy => tr(
                language,
                "抱歉，这个请求我不能处理。",
                "Sorry, I cannot handle that request.",
                "唔好意思，呢個要求我處理唔到。",
            ),
            Self::Draining => tr(
                language,
                "我正在休息整理，请稍后再叫我。",
                "I am tidying up right now, please call me again shortly.",
                "我而家執緊嘢，遲啲再叫我吖。",
            ),
            Self::Deny(reason) => deny_text(reason, language),
        }
    }
}

fn deny_text(reason: DenyReason, language: Language) -> String {
    match reason {
        DenyReason::GeofenceViolation => tr(
            language,
            "为了您的安全，现在不能打开大门。",
            "For your safety, I cannot open the door right now.",
            "為咗你安全，而家開唔到大門。",
        ),
        DenyReason::RateLimited => tr(
            language,
            "这个操作做得太频繁了，休息一下再试吧。",
            "That has been done quite a few times already, let us give it a short rest.",
            "呢個操作做得太密喇，唞一陣先再試吖。",
        ),
        DenyReason::DeviceNotWhitelisted | DenyReason::ActionNotAllowed => tr(
            language,
            "这个设备的操作不在允许的范围里。",
            "That device action is not on the allowed list.",
            "呢個裝置嘅操作唔喺允許範圍入面。",
        ),
        DenyReason::ElevatedStress => tr(
            language,
            "我们先休息一下，稍后再出门好吗？",
            "Let us rest for a moment first and go out a little later, alright?",
            "我哋先唞一唞，遲啲再出去好唔好？",
        ),
        _ => tr(
            language,
            "抱歉，这个请求我不能处理。",
            "Sorry, I cannot handle that request.",
            "唔好意思，呢個要求我處理唔到。",
        ),
    }
}

fn tr(language: Language, zh: &str, en: &str, yue: &str) -> String {
    match language {
        Language::Zh => zh.to_owned(),
        Language::En => en.to_owned(),
        Language::Yue => yue.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_ack_mentions_family_in_zh() {
        assert!(Phrase::EmergencyAck.text(Language::Zh).contains("已为您联系家人"));
    }

    #[test]
    fn every_phrase_has_all_languages() {
        let phrases = [
            Phrase::EmergencyAck,
            Phrase::ElevationAck,
            Phrase::Greeting,
            Phrase::ExecutedOk,
            Phrase::MoveAck,
            Phrase::CallAck,
            Phrase::ChatFallback,
            Phrase::ConfirmPrompt,
            Phrase::Busy,
            Phrase::Reassure,
            Phrase::RejectLowConfidence,
            Phrase::RejectPolicy,
            Phrase::Draining,
            Phrase::Deny(DenyReason::GeofenceViolation),
        ];
        for phrase in phrases {
            for language in [Language::Zh, Language::En, Language::Yue] {
                assert!(!phrase.text(language).is_empty());
            }
        }
    }

    #[test]
    fn deny_is_reason_specific() {
        let geo = Phrase::Deny(DenyReason::GeofenceViolation).text(Language::En);
        let rate = Phrase::Deny(DenyReason::RateLimited).text(Language::En);
        assert_ne!(geo, rate);
    }
}
