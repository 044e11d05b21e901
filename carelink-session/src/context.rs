use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use carelink_core::{EmotionReading, IncidentId, Intent, SessionId, Utterance, ZoneId};

/// How many utterances the rolling window keeps.
const RING_CAPACITY: usize = 10;

/// Half-life for the stress score: a reading this old has half its weight.
const EMOTION_HALF_LIFE_SECS: i64 = 600;

/// Consent switches supplied by the family client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentFlags {
    /// Whether video uplink may be activated outside emergencies.
    pub video: bool,
    /// Whether zone tracking is enabled.
    pub location: bool,
}

impl Default for ConsentFlags {
    fn default() -> Self {
        Self {
            video: true,
            location: true,
        }
    }
}

/// A high-risk intent parked while we wait for a confirming utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirm {
    pub intent: Intent,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingConfirm {
    /// Whether the window is still open at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Rolling per-user conversation state.
///
/// Single-writer: only the orchestrator mutates a context. Everyone else
/// reads a [`SessionView`] taken at a stage boundary.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session: SessionId,
    ring: VecDeque<Utterance>,
    last_emotion: Option<EmotionReading>,
    last_zone: Option<ZoneId>,
    active_incident: Option<IncidentId>,
    attention_until: Option<DateTime<Utc>>,
    pending_confirm: Option<PendingConfirm>,
    consent: ConsentFlags,
}

impl SessionContext {
    /// Create an empty context for a session.
    #[must_use]
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            ring: VecDeque::with_capacity(RING_CAPACITY),
            last_emotion: None,
            last_zone: None,
            active_incident: None,
            attention_until: None,
            pending_confirm: None,
            consent: ConsentFlags::default(),
        }
    }

    /// Append an utterance, evicting the oldest past capacity.
    pub fn push_utterance(&mut self, utterance: Utterance) {
        if self.ring.len() == RING_CAPACITY {
            self.ring.pop_front();
        }
        self.ring.push_back(utterance);
    }

    /// Record a fresh emotion reading.
    pub fn set_emotion(&mut self, reading: EmotionReading) {
        self.last_emotion = Some(reading);
    }

    /// Record the latest geofence zone.
    pub fn set_zone(&mut self, zone: ZoneId) {
        self.last_zone = Some(zone);
    }

    /// Open or refresh the attention window until `until`.
    pub fn open_attention(&mut self, until: DateTime<Utc>) {
        self.attention_until = Some(until);
    }

    /// Bind the active incident. The caller enforces at-most-one.
    pub fn set_active_incident(&mut self, incident: IncidentId) {
        self.active_incident = Some(incident);
    }

    /// Clear the incident handle once terminal.
    pub fn clear_incident(&mut self) {
        self.active_incident = None;
    }

    /// Park a high-risk intent awaiting confirmation.
    pub fn set_pending_confirm(&mut self, pending: PendingConfirm) {
        self.pending_confirm = Some(pending);
    }

    /// Drop the parked intent, returning it.
    pub fn take_pending_confirm(&mut self) -> Option<PendingConfirm> {
        self.pending_confirm.take()
    }

    /// Update consent switches.
    pub fn set_consent(&mut self, consent: ConsentFlags) {
        self.consent = consent;
    }

    /// The session's active incident, if any.
    #[must_use]
    pub fn active_incident(&self) -> Option<&IncidentId> {
        self.active_incident.as_ref()
    }

    /// Take a read snapshot at a stage boundary.
    #[must_use]
    pub fn view(&self, now: DateTime<Utc>) -> SessionView {
        SessionView {
            session: self.session.clone(),
            recent: self.ring.iter().cloned().collect(),
            stress: self.decayed_stress(now),
            last_zone: self.last_zone.clone(),
            active_incident: self.active_incident.clone(),
            attention_open: self.attention_until.is_some_and(|t| now < t),
            pending_confirm: self.pending_confirm.clone(),
            consent: self.consent,
        }
    }

    /// Stress with exponential time decay applied.
    fn decayed_stress(&self, now: DateTime<Utc>) -> f32 {
        let Some(reading) = &self.last_emotion else {
            return 0.0;
        };
        let age = (now - reading.taken_at).max(Duration::zero());
        #[allow(clippy::cast_precision_loss)]
        let half_lives = age.num_seconds() as f32 / EMOTION_HALF_LIFE_SECS as f32;
        reading.stress * 0.5_f32.powf(half_lives)
    }
}

/// A cheap read snapshot of one session, consistent at the instant taken.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session: SessionId,
    pub recent: Vec<Utterance>,
    /// Stress score with time decay already applied.
    pub stress: f32,
    pub last_zone: Option<ZoneId>,
    pub active_incident: Option<IncidentId>,
    pub attention_open: bool,
    pub pending_confirm: Option<PendingConfirm>,
    pub consent: ConsentFlags,
}

impl SessionView {
    /// Short rolling summary for the LLM request (most recent first).
    #[must_use]
    pub fn summary(&self) -> String {
        self.recent
            .iter()
            .rev()
            .take(3)
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_core::Language;

    fn utterance(id: &str, text: &str) -> Utterance {
        Utterance::new(id, "s-1", text, Language::Zh, 0.9)
    }

    #[test]
    fn ring_evicts_oldest_past_ten() {
        let mut ctx = SessionContext::new(SessionId::new("s-1"));
        for i in 0..12 {
            ctx.push_utterance(utterance(&format!("u-{i}"), "text"));
        }
        let view = ctx.view(Utc::now());
        assert_eq!(view.recent.len(), 10);
        assert_eq!(view.recent[0].id.as_str(), "u-2");
        assert_eq!(view.recent[9].id.as_str(), "u-11");
    }

    #[test]
    fn stress_decays_over_time() {
        let mut ctx = SessionContext::new(SessionId::new("s-1"));
        let taken = Utc::now();
        ctx.set_emotion(EmotionReading {
            stress: 0.8,
            label: None,
            taken_at: taken,
        });

        let fresh = ctx.view(taken).stress;
        assert!((fresh - 0.8).abs() < 1e-3);

        let later = taken + Duration::seconds(EMOTION_HALF_LIFE_SECS);
        let decayed = ctx.view(later).stress;
        assert!((decayed - 0.4).abs() < 1e-3);
    }

    #[test]
    fn attention_window_closes() {
        let mut ctx = SessionContext::new(SessionId::new("s-1"));
        let now = Utc::now();
        ctx.open_attention(now + Duration::seconds(120));
        assert!(ctx.view(now).attention_open);
        assert!(!ctx.view(now + Duration::seconds(121)).attention_open);
    }

    #[test]
    fn pending_confirm_expiry_boundary() {
        let now = Utc::now();
        let pending = PendingConfirm {
            intent: Intent::Chat {
                style: carelink_core::ChatStyle::Neutral,
            },
            created_at: now,
            expires_at: now + Duration::seconds(30),
        };
        assert!(pending.is_live(now + Duration::seconds(29)));
        // Exactly on the boundary the window is closed.
        assert!(!pending.is_live(now + Duration::seconds(30)));
    }

    #[test]
    fn summary_takes_most_recent_three() {
        let mut ctx = SessionContext::new(SessionId::new("s-1"));
        for (i, text) in ["早上好", "开灯", "关灯", "讲个笑话"].iter().enumerate() {
            ctx.push_utterance(utterance(&format!("u-{i}"), text));
        }
        let view = ctx.view(Utc::now());
        assert_eq!(view.summary(), "讲个笑话 | 关灯 | 开灯");
    }
}
