use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use carelink_core::{EmotionReading, IncidentId, SessionId, Utterance, ZoneId};

use crate::context::{PendingConfirm, SessionContext, SessionView};

/// Registry of live session contexts.
///
/// Writes go through the orchestrator (single logical writer per session);
/// any component may take a [`SessionView`] snapshot.
#[derive(Default)]
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<RwLock<SessionContext>>>,
}

impl SessionManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, session: &SessionId) -> Arc<RwLock<SessionContext>> {
        self.sessions
            .entry(session.clone())
            .or_insert_with(|| Arc::new(RwLock::new(SessionContext::new(session.clone()))))
            .clone()
    }

    /// Snapshot one session's state at `now`.
    #[must_use]
    pub fn view(&self, session: &SessionId, now: DateTime<Utc>) -> SessionView {
        self.entry(session).read().view(now)
    }

    /// Append an utterance to the session's ring.
    pub fn record_utterance(&self, utterance: Utterance) {
        let ctx = self.entry(&utterance.session);
        ctx.write().push_utterance(utterance);
    }

    /// Record an emotion reading from the affect collaborator.
    pub fn record_emotion(&self, session: &SessionId, reading: EmotionReading) {
        self.entry(session).write().set_emotion(reading);
    }

    /// Record the latest geofence zone.
    pub fn record_zone(&self, session: &SessionId, zone: ZoneId) {
        self.entry(session).write().set_zone(zone);
    }

    /// Open or refresh the attention window.
    pub fn open_attention(&self, session: &SessionId, until: DateTime<Utc>) {
        self.entry(session).write().open_attention(until);
    }

    /// Bind the session's active incident.
    pub fn set_active_incident(&self, session: &SessionId, incident: IncidentId) {
        self.entry(session).write().set_active_incident(incident);
    }

    /// Clear the incident handle if it matches `incident`.
    pub fn clear_incident(&self, session: &SessionId, incident: &IncidentId) {
        let ctx = self.entry(session);
        let mut guard = ctx.write();
        if guard.active_incident() == Some(incident) {
            guard.clear_incident();
        }
    }

    /// Park a high-risk intent awaiting confirmation.
    pub fn set_pending_confirm(&self, session: &SessionId, pending: PendingConfirm) {
        self.entry(session).write().set_pending_confirm(pending);
    }

    /// Remove and return the parked intent, if any.
    pub fn take_pending_confirm(&self, session: &SessionId) -> Option<PendingConfirm> {
        self.entry(session).write().take_pending_confirm()
    }

    /// Remove the parked intent only if it is the one created at
    /// `created_at` (expiry timers must not discard a newer confirmation).
    pub fn take_pending_confirm_if_created_at(
        &self,
        session: &SessionId,
        created_at: chrono::DateTime<Utc>,
    ) -> Option<PendingConfirm> {
        let ctx = self.entry(session);
        let mut guard = ctx.write();
        match guard.take_pending_confirm() {
            Some(pending) if pending.created_at == created_at => Some(pending),
            Some(other) => {
                guard.set_pending_confirm(other);
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_core::{ChatStyle, Intent, Language};

    #[test]
    fn views_are_isolated_per_session() {
        let mgr = SessionManager::new();
        let a = SessionId::new("a");
        let b = SessionId::new("b");
        mgr.record_zone(&a, ZoneId::new("home"));

        let now = Utc::now();
        assert_eq!(mgr.view(&a, now).last_zone.unwrap().as_str(), "home");
        assert!(mgr.view(&b, now).last_zone.is_none());
    }

    #[test]
    fn incident_clear_requires_matching_id() {
        let mgr = SessionManager::new();
        let s = SessionId::new("s");
        mgr.set_active_incident(&s, IncidentId::new("inc-1"));

        mgr.clear_incident(&s, &IncidentId::new("inc-2"));
        assert!(mgr.view(&s, Utc::now()).active_incident.is_some());

        mgr.clear_incident(&s, &IncidentId::new("inc-1"));
        assert!(mgr.view(&s, Utc::now()).active_incident.is_none());
    }

    #[test]
    fn take_pending_confirm_is_one_shot() {
        let mgr = SessionManager::new();
        let s = SessionId::new("s");
        let now = Utc::now();
        mgr.set_pending_confirm(
            &s,
            PendingConfirm {
                intent: Intent::Chat {
                    style: ChatStyle::Neutral,
                },
                created_at: now,
                expires_at: now + chrono::Duration::seconds(30),
            },
        );
        assert!(mgr.take_pending_confirm(&s).is_some());
        assert!(mgr.take_pending_confirm(&s).is_none());
    }

    #[test]
    fn record_utterance_reaches_view() {
        let mgr = SessionManager::new();
        let utt = Utterance::new("u-1", "s", "你好", Language::Zh, 0.9);
        mgr.record_utterance(utt);
        let view = mgr.view(&SessionId::new("s"), Utc::now());
        assert_eq!(view.recent.len(), 1);
    }
}
