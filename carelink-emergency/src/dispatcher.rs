use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tokio_util::task::TaskTracker;
use tracing::{info, instrument, warn};

use carelink_adapter::JobExecutor;
use carelink_audit::{AuditDraft, AuditSink, AuditStage};
use carelink_bus::EventBus;
use carelink_core::{
    AdapterCommand, AdapterJob, EmergencyCategory, Event, IncidentEvent, IncidentEventKind,
    IncidentId, NotifyChannel, SessionId, Severity, UtteranceId,
};
use carelink_policy::{LadderRung, PolicySnapshot, PolicyStore};

use crate::ack::{AckRouter, CallAck};
use crate::incident::{Incident, IncidentState};

/// Deadline granted to each emergency fan-out job.
const FANOUT_JOB_DEADLINE: Duration = Duration::from_secs(30);

/// What `accept` decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// A new incident was opened and fan-out started.
    Opened {
        incident: IncidentId,
        accepted_in: Duration,
    },
    /// The session already has a live incident; nothing new opened.
    AlreadyActive { incident: IncidentId },
    /// A recent incident for the same cause is inside the quench window.
    Quenched { category: EmergencyCategory },
}

struct Inner {
    executor: Arc<JobExecutor>,
    policy: Arc<PolicyStore>,
    audit: Arc<AuditSink>,
    bus: EventBus,
    acks: Arc<AckRouter>,
    incidents: DashMap<SessionId, (IncidentId, Arc<Mutex<Incident>>)>,
    quench: DashMap<(SessionId, EmergencyCategory), Instant>,
    tracker: TaskTracker,
}

/// The emergency bypass path.
///
/// `accept` is the hot entry point: it opens the incident, spawns the
/// fan-out and ladder tasks, and returns without awaiting any I/O so the
/// audio path gets its acknowledgement within the accept budget. Fan-out
/// (scene, video, notifications) and the call ladder then proceed
/// independently; an active incident is never cancelled by utterance-level
/// deadlines.
#[derive(Clone)]
pub struct EmergencyDispatcher {
    inner: Arc<Inner>,
}

impl EmergencyDispatcher {
    /// Create a dispatcher with its own ack router.
    #[must_use]
    pub fn new(
        executor: Arc<JobExecutor>,
        policy: Arc<PolicyStore>,
        audit: Arc<AuditSink>,
        bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                policy,
                audit,
                bus,
                acks: Arc::new(AckRouter::new()),
                incidents: DashMap::new(),
                quench: DashMap::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// The ack router fed by the SIP callback surface.
    #[must_use]
    pub fn acks(&self) -> Arc<AckRouter> {
        Arc::clone(&self.inner.acks)
    }

    /// The session's live incident, if one is open.
    #[must_use]
    pub fn active_incident(&self, session: &SessionId) -> Option<IncidentId> {
        self.inner.incidents.get(session).map(|e| e.0.clone())
    }

    /// Accept an emergency classification.
    ///
    /// Returns after spawning the side-effect tasks; wall time from call to
    /// return is measured against the policy accept budget and logged as an
    /// incident-quality defect when missed.
    #[instrument(skip(self), fields(session = %session, category = %category))]
    #[allow(clippy::cast_possible_truncation)]
    pub fn accept(
        &self,
        session: &SessionId,
        utterance: Option<&UtteranceId>,
        category: EmergencyCategory,
        severity: Severity,
    ) -> AcceptOutcome {
        let started = Instant::now();
        let inner = &self.inner;
        let policy = inner.policy.current();

        if let Some(existing) = inner.incidents.get(session) {
            return AcceptOutcome::AlreadyActive {
                incident: existing.0.clone(),
            };
        }

        if let Some(closed_at) = inner.quench.get(&(session.clone(), category)) {
            if closed_at.elapsed() < policy.emergency.quench_window {
                info!(session = %session, category = %category, "incident quenched");
                return AcceptOutcome::Quenched { category };
            }
        }

        let incident = Incident::open(session.clone(), category, severity);
        let incident_id = incident.id.clone();
        let handle = Arc::new(Mutex::new(incident));
        inner
            .incidents
            .insert(session.clone(), (incident_id.clone(), Arc::clone(&handle)));
        let ack_rx = inner.acks.register(&incident_id);

        let mut opened = AuditDraft::new(session.as_str(), AuditStage::Emergency, "opened")
            .with_incident(incident_id.as_str())
            .with_details(serde_json::json!({
                "category": category.as_str(),
                "severity": severity.level(),
            }));
        if let Some(utterance) = utterance {
            opened = opened.with_utterance(utterance.as_str());
        }
        inner.audit.emit(opened);
        inner.bus.publish(Event::Incident(IncidentEvent {
            incident: incident_id.clone(),
            session: session.clone(),
            kind: IncidentEventKind::Opened { category, severity },
        }));

        // Shared step counter: every fan-out and ladder job gets a unique
        // (incident, step_seq) idempotency key.
        let step_seq = Arc::new(AtomicU32::new(0));

        let fan = FanOut {
            inner: Arc::clone(&self.inner),
            policy: Arc::clone(&policy),
            incident: incident_id.clone(),
            session: session.clone(),
            category,
            severity,
            step_seq: Arc::clone(&step_seq),
        };
        inner.tracker.spawn(fan.clone().run_scene_and_video());
        inner.tracker.spawn(fan.clone().run_notifications());

        let ladder = LadderRunner {
            fan,
            handle,
            ack_rx,
        };
        inner.tracker.spawn(ladder.run());

        let accepted_in = started.elapsed();
        if accepted_in > policy.emergency.accept_budget {
            warn!(elapsed_ms = accepted_in.as_millis() as u64, "emergency accept budget missed");
            inner.audit.emit(
                AuditDraft::new(session.as_str(), AuditStage::Emergency, "accept_late")
                    .with_incident(incident_id.as_str())
                    .with_duration_ms(accepted_in.as_millis() as u64),
            );
        }

        AcceptOutcome::Opened {
            incident: incident_id,
            accepted_in,
        }
    }

    /// Deliver an ack from the callback surface.
    pub fn deliver_ack(&self, ack: CallAck) -> bool {
        self.inner.acks.deliver(ack)
    }

    /// Wait for all incident tasks to finish (drain). Open incidents run
    /// to resolution or exhaustion first.
    pub async fn drain(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }
}

#[derive(Clone)]
struct FanOut {
    inner: Arc<Inner>,
    policy: Arc<PolicySnapshot>,
    incident: IncidentId,
    session: SessionId,
    category: EmergencyCategory,
    severity: Severity,
    step_seq: Arc<AtomicU32>,
}

impl FanOut {
    fn next_seq(&self) -> u32 {
        self.step_seq.fetch_add(1, Ordering::SeqCst)
    }

    fn job(&self, command: AdapterCommand) -> AdapterJob {
        let seq = self.next_seq();
        AdapterJob::new(
            self.session.clone(),
            command,
            Instant::now() + FANOUT_JOB_DEADLINE,
        )
        .emergency(&self.incident, seq)
    }

    fn audit_job(&self, stage_outcome: &str, details: serde_json::Value) {
        self.inner.audit.emit(
            AuditDraft::new(self.session.as_str(), AuditStage::Emergency, stage_outcome)
                .with_incident(self.incident.as_str())
                .with_details(details),
        );
    }

    /// Emergency scene plus video uplink.
    async fn run_scene_and_video(self) {
        if !self.policy.emergency.scene.is_empty() {
            let job = self.job(AdapterCommand::ApplyScene {
                name: "emergency".into(),
                steps: self.policy.emergency.scene.clone(),
            });
            let outcome = self.inner.executor.submit(job, &self.policy).await;
            self.audit_job("scene", serde_json::to_value(&outcome).unwrap_or_default());
        }

        if let Some(video) = self.inner.executor.registry().video() {
            if video.capabilities().privacy_restricted {
                self.audit_job("video_privacy_restricted", serde_json::Value::Null);
            }
        }
        let job = self.job(AdapterCommand::ActivateVideo {
            stream: self.incident.to_string(),
            cameras: self.policy.emergency.cameras.clone(),
        });
        let outcome = self.inner.executor.submit(job, &self.policy).await;
        self.audit_job("video", serde_json::to_value(&outcome).unwrap_or_default());
    }

    /// SMS and email to every ladder contact. Independent of the call
    /// ladder; failures here never block escalation.
    async fn run_notifications(self) {
        let fields = std::collections::HashMap::from([
            ("category".to_owned(), self.category.as_str().to_owned()),
            ("severity".to_owned(), self.severity.level().to_string()),
            ("incident".to_owned(), self.incident.to_string()),
        ]);

        for rung in &self.policy.ladder {
            let contact = &rung.contact;
            let sms = self.job(AdapterCommand::Notify {
                channel: NotifyChannel::Sms,
                recipient: contact.sms_number().to_owned(),
                template: "emergency_opened".into(),
                fields: fields.clone(),
            });
            let outcome = self.inner.executor.submit(sms, &self.policy).await;
            self.audit_job(
                "notify_sms",
                serde_json::json!({"contact": contact.id.as_str(), "outcome": outcome}),
            );

            if let Some(email) = &contact.email {
                let job = self.job(AdapterCommand::Notify {
                    channel: NotifyChannel::Email,
                    recipient: email.clone(),
                    template: "emergency_opened".into(),
                    fields: fields.clone(),
                });
                let outcome = self.inner.executor.submit(job, &self.policy).await;
                self.audit_job(
                    "notify_email",
                    serde_json::json!({"contact": contact.id.as_str(), "outcome": outcome}),
                );
            }
        }
    }

    fn publish(&self, kind: IncidentEventKind) {
        self.inner.bus.publish(Event::Incident(IncidentEvent {
            incident: self.incident.clone(),
            session: self.session.clone(),
            kind,
        }));
    }

    fn finish(&self, terminal: IncidentState) {
        self.inner.incidents.remove(&self.session);
        self.inner.acks.unregister(&self.incident);
        self.inner
            .quench
            .insert((self.session.clone(), self.category), Instant::now());
        let kind = if terminal == IncidentState::Resolved {
            IncidentEventKind::Resolved
        } else {
            IncidentEventKind::Exhausted
        };
        self.publish(kind);
    }
}

struct LadderRunner {
    fan: FanOut,
    handle: Arc<Mutex<Incident>>,
    ack_rx: mpsc::UnboundedReceiver<CallAck>,
}

enum RungOutcome {
    Reached(carelink_core::ContactId),
    Failed,
}

impl LadderRunner {
    /// Walk the contact ladder to resolution or exhaustion.
    async fn run(mut self) {
        let ladder = self.fan.policy.ladder.clone();
        for (rung_idx, rung) in ladder.iter().enumerate() {
            self.advance(IncidentState::Calling { rung: rung_idx }).await;
            self.fan
                .publish(IncidentEventKind::CallingRung {
                    rung: rung_idx,
                    contact: rung.contact.id.clone(),
                });
            self.fan.audit_job(
                "calling",
                serde_json::json!({"rung": rung_idx, "contact": rung.contact.id.as_str()}),
            );
            self.handle.lock().await.record_attempt(rung.contact.id.clone());

            match self.try_rung(rung_idx, rung).await {
                RungOutcome::Reached(contact) => {
                    self.handle.lock().await.record_reached(contact.clone());
                    self.advance(IncidentState::Reached { rung: rung_idx }).await;
                    self.fan
                        .publish(IncidentEventKind::ContactReached { contact: contact.clone() });
                    self.fan.audit_job(
                        "reached",
                        serde_json::json!({"rung": rung_idx, "contact": contact.as_str()}),
                    );
                    self.resolve().await;
                    return;
                }
                RungOutcome::Failed => {
                    self.advance(IncidentState::Failed { rung: rung_idx }).await;
                    self.fan.publish(IncidentEventKind::RungFailed {
                        rung: rung_idx,
                        contact: rung.contact.id.clone(),
                    });
                    self.fan.audit_job(
                        "rung_failed",
                        serde_json::json!({"rung": rung_idx, "contact": rung.contact.id.as_str()}),
                    );
                }
            }
        }

        // Ladder exhausted: video and notifications stay active.
        self.advance(IncidentState::Exhausted).await;
        self.fan.audit_job("exhausted", serde_json::Value::Null);
        warn!(incident = %self.fan.incident, "escalation ladder exhausted");
        self.fan.finish(IncidentState::Exhausted);
    }

    /// Place the rung's call and wait for an acknowledgement.
    async fn try_rung(&mut self, rung_idx: usize, rung: &LadderRung) -> RungOutcome {
        let seq = self.fan.next_seq();
        let job = AdapterJob::new(
            self.fan.session.clone(),
            AdapterCommand::PlaceCall {
                contact: rung.contact.clone(),
                incident: self.fan.incident.clone(),
                step_seq: seq,
            },
            Instant::now() + FANOUT_JOB_DEADLINE,
        )
        .emergency(&self.fan.incident, seq);

        let outcome = self.fan.inner.executor.submit(job, &self.fan.policy).await;
        let placed = match &outcome {
            carelink_core::JobOutcome::Completed { response } => {
                response.body.get("placement").and_then(|p| p.as_str()) == Some("accepted")
            }
            _ => false,
        };
        if !placed {
            warn!(incident = %self.fan.incident, rung = rung_idx, "call placement failed");
            return RungOutcome::Failed;
        }

        self.advance(IncidentState::Waiting { rung: rung_idx }).await;

        let deadline = tokio::time::Instant::now() + rung.ring_timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.ack_rx.recv()).await {
                Ok(Some(ack)) if ack.contact == rung.contact.id => {
                    if ack.status.is_positive() {
                        return RungOutcome::Reached(ack.contact);
                    }
                    return RungOutcome::Failed;
                }
                // An ack from an earlier rung's contact arriving late still
                // counts as a human acknowledgement.
                Ok(Some(ack)) if ack.status.is_positive() => {
                    return RungOutcome::Reached(ack.contact);
                }
                Ok(Some(_)) => {}
                Ok(None) => return RungOutcome::Failed,
                Err(_) => {
                    info!(incident = %self.fan.incident, rung = rung_idx, "ring timeout");
                    return RungOutcome::Failed;
                }
            }
        }
    }

    async fn resolve(&self) {
        self.advance(IncidentState::Resolved).await;
        let job = self.fan.job(AdapterCommand::DeactivateVideo {
            stream: self.fan.incident.to_string(),
        });
        let outcome = self.fan.inner.executor.submit(job, &self.fan.policy).await;
        self.fan
            .audit_job("resolved", serde_json::json!({"video_deactivate": outcome}));
        self.fan.finish(IncidentState::Resolved);
    }

    async fn advance(&self, next: IncidentState) {
        let mut incident = self.handle.lock().await;
        // Never panic on the emergency path; a refused transition is a bug.
        if let Err(err) = incident.advance(next) {
            tracing::error!(incident = %incident.id, error = %err, "refused incident transition");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ack::AckStatus;
    use carelink_adapter::RecordingAdapters;
    use carelink_audit::{AuditStore, MemoryAuditStore};
    use carelink_core::{AdapterKind, ContactId};
    use carelink_policy::testing::sample_snapshot;

    struct Fixture {
        dispatcher: EmergencyDispatcher,
        recorder: Arc<RecordingAdapters>,
        store: Arc<MemoryAuditStore>,
    }

    fn fixture() -> Fixture {
        let policy = Arc::new(PolicyStore::from_snapshot(sample_snapshot()));
        let recorder = Arc::new(RecordingAdapters::new());
        let executor = Arc::new(JobExecutor::new(
            recorder.clone().into_registry(),
            &policy.current(),
        ));
        let store = Arc::new(MemoryAuditStore::new());
        let audit = Arc::new(AuditSink::new(store.clone()));
        let dispatcher = EmergencyDispatcher::new(executor, policy, audit, EventBus::new());
        Fixture {
            dispatcher,
            recorder,
            store,
        }
    }

    fn accept(dispatcher: &EmergencyDispatcher, session: &str) -> AcceptOutcome {
        dispatcher.accept(
            &SessionId::new(session),
            Some(&UtteranceId::new("u-1")),
            EmergencyCategory::Medical,
            Severity::MAX,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn accept_opens_and_fans_out() {
        let fx = fixture();
        let outcome = accept(&fx.dispatcher, "s-1");
        let incident = match outcome {
            AcceptOutcome::Opened { incident, .. } => incident,
            other => panic!("expected Opened, got {other:?}"),
        };
        assert!(fx.dispatcher.active_incident(&SessionId::new("s-1")).is_some());

        // Let fan-out run; first rung answers immediately.
        tokio::task::yield_now().await;
        fx.dispatcher.deliver_ack(CallAck {
            incident: incident.clone(),
            contact: ContactId::new("daughter"),
            status: AckStatus::Answered,
        });
        fx.dispatcher.drain().await;

        let commands = fx.recorder.commands();
        let kinds: Vec<AdapterKind> = commands.iter().map(carelink_core::AdapterCommand::kind).collect();
        assert!(kinds.contains(&AdapterKind::SmartHome), "scene missing: {kinds:?}");
        assert!(kinds.contains(&AdapterKind::Video));
        assert!(kinds.contains(&AdapterKind::Notify));
        assert!(kinds.contains(&AdapterKind::Call));

        // Resolved: incident no longer active.
        assert!(fx.dispatcher.active_incident(&SessionId::new("s-1")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn second_emergency_in_same_session_is_already_active() {
        let fx = fixture();
        let first = accept(&fx.dispatcher, "s-1");
        let second = accept(&fx.dispatcher, "s-1");
        match (first, second) {
            (
                AcceptOutcome::Opened { incident: a, .. },
                AcceptOutcome::AlreadyActive { incident: b },
            ) => assert_eq!(a, b),
            other => panic!("unexpected outcomes {other:?}"),
        }
        // Close it out so drain terminates.
        let incident = fx.dispatcher.active_incident(&SessionId::new("s-1")).unwrap();
        tokio::task::yield_now().await;
        fx.dispatcher.deliver_ack(CallAck {
            incident,
            contact: ContactId::new("daughter"),
            status: AckStatus::Answered,
        });
        fx.dispatcher.drain().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ladder_walks_all_rungs_then_exhausts() {
        let fx = fixture();
        let outcome = accept(&fx.dispatcher, "s-1");
        assert!(matches!(outcome, AcceptOutcome::Opened { .. }));

        // Nobody ever answers; paused time auto-advances through every
        // ring timeout.
        fx.dispatcher.drain().await;

        let calls = fx.recorder.commands_for(AdapterKind::Call);
        assert_eq!(calls.len(), 4, "one placement per rung: {calls:?}");

        // Ladder order: family -> caregiver -> doctor -> services.
        let order: Vec<String> = calls
            .iter()
            .map(|c| match c {
                AdapterCommand::PlaceCall { contact, .. } => contact.id.to_string(),
                other => panic!("unexpected command {other:?}"),
            })
            .collect();
        assert_eq!(order, vec!["daughter", "caregiver", "doctor", "services"]);

        // Exhausted, but video was never deactivated.
        let video = fx.recorder.commands_for(AdapterKind::Video);
        assert_eq!(video.len(), 1);
        assert!(matches!(video[0], AdapterCommand::ActivateVideo { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn quench_window_suppresses_reopen() {
        let fx = fixture();
        let outcome = accept(&fx.dispatcher, "s-1");
        let incident = match outcome {
            AcceptOutcome::Opened { incident, .. } => incident,
            other => panic!("expected Opened, got {other:?}"),
        };
        tokio::task::yield_now().await;
        fx.dispatcher.deliver_ack(CallAck {
            incident,
            contact: ContactId::new("daughter"),
            status: AckStatus::Answered,
        });
        fx.dispatcher.drain().await;

        let again = accept(&fx.dispatcher, "s-1");
        assert!(matches!(again, AcceptOutcome::Quenched { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn declined_ack_advances_ladder() {
        let fx = fixture();
        let outcome = accept(&fx.dispatcher, "s-1");
        let incident = match outcome {
            AcceptOutcome::Opened { incident, .. } => incident,
            other => panic!("expected Opened, got {other:?}"),
        };
        tokio::task::yield_now().await;
        fx.dispatcher.deliver_ack(CallAck {
            incident: incident.clone(),
            contact: ContactId::new("daughter"),
            status: AckStatus::Declined,
        });
        // Second rung answers.
        tokio::task::yield_now().await;
        fx.dispatcher.deliver_ack(CallAck {
            incident,
            contact: ContactId::new("caregiver"),
            status: AckStatus::Dtmf { key: "1".into() },
        });
        fx.dispatcher.drain().await;

        let calls = fx.recorder.commands_for(AdapterKind::Call);
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn audit_seq_is_gap_free_per_incident() {
        let fx = fixture();
        let outcome = accept(&fx.dispatcher, "s-1");
        let incident = match outcome {
            AcceptOutcome::Opened { incident, .. } => incident,
            other => panic!("expected Opened, got {other:?}"),
        };
        tokio::task::yield_now().await;
        fx.dispatcher.deliver_ack(CallAck {
            incident: incident.clone(),
            contact: ContactId::new("daughter"),
            status: AckStatus::Answered,
        });
        fx.dispatcher.drain().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let records = fx
            .store
            .query(&carelink_audit::AuditQuery {
                incident: Some(incident),
                limit: Some(1000),
                ..Default::default()
            })
            .await
            .unwrap();
        let mut seqs: Vec<u64> = records.iter().filter_map(|r| r.incident_seq).collect();
        seqs.sort_unstable();
        let expected: Vec<u64> = (0..seqs.len() as u64).collect();
        assert_eq!(seqs, expected, "per-incident seq must be gap-free");
    }
}
