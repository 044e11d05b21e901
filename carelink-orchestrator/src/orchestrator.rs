use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use carelink_adapter::JobExecutor;
use carelink_audit::{AuditDraft, AuditSink, AuditStage};
use carelink_bus::EventBus;
use carelink_core::{
    AdapterCommand, AdapterJob, AdapterResult, Classification, ClassificationKind, DenyReason,
    EmergencyCategory, Event, GuardDecision, GuardStage, Intent, IntentSource, JobOutcome,
    JobPriority, NotifyChannel, PipelineOutcome, RejectReason, ResponseEnvelope, Severity,
    SpeechEnvelope, Urgency, Utterance, payload_hash,
};
use carelink_emergency::{AcceptOutcome, EmergencyDispatcher};
use carelink_guard::{RateLimiter, post_guard, pre_guard};
use carelink_intent::{IntentClient, IntentRequest};
use carelink_policy::{PolicySnapshot, PolicyStore};
use carelink_rules::classify;
use carelink_session::{PendingConfirm, SessionManager};

use crate::budget::DeadlineBudget;
use crate::responses::Phrase;

/// The per-utterance pipeline.
///
/// Sequences pre-guard, rules, the optional LLM stage, post-guard, and
/// adapter dispatch under one deadline budget, and owns all session-context
/// writes. The emergency branch hands off to the dispatcher and answers
/// immediately.
pub struct Orchestrator {
    policy: Arc<PolicyStore>,
    sessions: Arc<SessionManager>,
    limiter: Arc<RateLimiter>,
    intent: IntentClient,
    executor: Arc<JobExecutor>,
    emergency: EmergencyDispatcher,
    audit: Arc<AuditSink>,
    bus: EventBus,
    draining: AtomicBool,
    tracker: TaskTracker,
}

impl Orchestrator {
    /// Wire the pipeline together.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy: Arc<PolicyStore>,
        sessions: Arc<SessionManager>,
        limiter: Arc<RateLimiter>,
        intent: IntentClient,
        executor: Arc<JobExecutor>,
        emergency: EmergencyDispatcher,
        audit: Arc<AuditSink>,
        bus: EventBus,
    ) -> Self {
        Self {
            policy,
            sessions,
            limiter,
            intent,
            executor,
            emergency,
            audit,
            bus,
            draining: AtomicBool::new(false),
            tracker: TaskTracker::new(),
        }
    }

    /// The internal event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The session registry.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// The policy store.
    #[must_use]
    pub fn policy(&self) -> &Arc<PolicyStore> {
        &self.policy
    }

    /// The emergency dispatcher (callback surfaces deliver acks here).
    #[must_use]
    pub fn emergency(&self) -> &EmergencyDispatcher {
        &self.emergency
    }

    /// Stop accepting new utterances.
    pub fn begin_drain(&self) {
        info!("orchestrator draining");
        self.draining.store(true, Ordering::SeqCst);
    }

    /// Quiesce: refuse new work, let spawned tasks and open incidents
    /// finish, then flush the audit sink.
    pub async fn drain(&self) {
        self.begin_drain();
        self.tracker.close();
        self.tracker.wait().await;
        self.emergency.drain().await;
        self.audit.shutdown().await;
    }

    /// Run one utterance through the pipeline to a response envelope.
    #[instrument(skip(self, utterance), fields(utterance = %utterance.id, session = %utterance.session))]
    #[allow(clippy::cast_possible_truncation)]
    pub async fn handle_utterance(&self, utterance: Utterance) -> ResponseEnvelope {
        let policy = self.policy.current();
        let budget = DeadlineBudget::start(policy.deadlines.utterance);
        let language = utterance.language;

        if self.draining.load(Ordering::SeqCst) {
            return self.respond(&utterance, Phrase::Draining, Urgency::Calming, PipelineOutcome::Draining);
        }

        self.bus.publish(Event::Utterance(utterance.clone()));

        // Confirmation window: a live pending intent plus a confirming
        // phrase dispatches the parked action; an expired one is discarded
        // silently (the user only ever hears about it via the audit log).
        let now = Utc::now();
        let view = self.sessions.view(&utterance.session, now);
        if let Some(pending) = &view.pending_confirm {
            if !pending.is_live(now) {
                if self.sessions.take_pending_confirm(&utterance.session).is_some() {
                    self.audit.emit(
                        AuditDraft::new(utterance.session.as_str(), AuditStage::Confirm, "confirm_timeout")
                            .with_utterance(utterance.id.as_str()),
                    );
                }
            } else if policy.confirm.matches(&utterance.text, language) {
                if let Some(pending) = self.sessions.take_pending_confirm(&utterance.session) {
                    self.audit.emit(
                        AuditDraft::new(utterance.session.as_str(), AuditStage::Confirm, "confirmed")
                            .with_utterance(utterance.id.as_str()),
                    );
                    self.sessions.record_utterance(utterance.clone());
                    return self
                        .guard_and_dispatch(pending.intent, &utterance, &policy, &budget, true)
                        .await;
                }
            }
        }

        // Pre-guard.
        let verdict = pre_guard(&utterance, &policy);
        self.bus.publish(Event::Guard {
            utterance: utterance.id.clone(),
            stage: GuardStage::Pre,
            verdict: verdict.clone(),
        });
        self.audit.emit(
            AuditDraft::new(
                utterance.session.as_str(),
                AuditStage::PreGuard,
                decision_tag(verdict.decision),
            )
            .with_utterance(utterance.id.as_str())
            .with_details(serde_json::json!({"reasons": verdict.reasons}))
            .with_payload_hash(payload_hash(&serde_json::json!({"text": utterance.text}))),
        );
        if verdict.decision == GuardDecision::Deny {
            let deny = verdict.reasons.first().copied().unwrap_or(DenyReason::BannedPhrase);
            self.sessions.record_utterance(utterance.clone());
            return self.respond(
                &utterance,
                Phrase::RejectPolicy,
                Urgency::Calming,
                PipelineOutcome::Rejected {
                    reason: RejectReason::Policy { deny },
                },
            );
        }

        // Rules engine.
        let rules_started = std::time::Instant::now();
        let classification = classify(&utterance, &policy, &view);
        let rules_elapsed = rules_started.elapsed();
        if rules_elapsed > policy.deadlines.rules {
            warn!(elapsed_us = rules_elapsed.as_micros() as u64, "rules budget missed");
        }
        self.audit.emit(
            AuditDraft::new(utterance.session.as_str(), AuditStage::Rules, kind_tag(&classification))
                .with_utterance(utterance.id.as_str())
                .with_details(serde_json::json!({
                    "matched_rules": classification.matched_rules,
                    "confidence": classification.confidence,
                }))
                .with_duration_ms(rules_elapsed.as_millis() as u64),
        );
        self.bus.publish(Event::Classified {
            utterance: utterance.id.clone(),
            classification: classification.clone(),
        });

        if classification.refresh_attention {
            let until = now
                + chrono::Duration::from_std(policy.attention_window)
                    .unwrap_or_else(|_| chrono::Duration::seconds(120));
            self.sessions.open_attention(&utterance.session, until);
        }

        match classification.kind {
            ClassificationKind::Emergency { category, severity } => {
                self.handle_emergency(&utterance, category, severity)
            }

            ClassificationKind::Reject { reason } => {
                self.sessions.record_utterance(utterance.clone());
                let phrase = match reason {
                    RejectReason::LowConfidence => Phrase::RejectLowConfidence,
                    RejectReason::Policy { .. } => Phrase::RejectPolicy,
                };
                self.respond(
                    &utterance,
                    phrase,
                    Urgency::Normal,
                    PipelineOutcome::Rejected { reason },
                )
            }

            ClassificationKind::DirectIntent { intent } => {
                self.bus.publish(Event::Intent {
                    utterance: utterance.id.clone(),
                    source: IntentSource::DirectRule,
                    intent: intent.clone(),
                });
                self.guard_and_dispatch(intent, &utterance, &policy, &budget, false)
                    .await
            }

            ClassificationKind::RouteToLlm => {
                self.resolve_and_dispatch(&utterance, &view.summary(), &policy, &budget)
                    .await
            }
        }
    }

    /// Emergency branch: hand off and acknowledge immediately.
    #[allow(clippy::cast_possible_truncation)]
    fn handle_emergency(
        &self,
        utterance: &Utterance,
        category: EmergencyCategory,
        severity: Severity,
    ) -> ResponseEnvelope {
        let accept = self
            .emergency
            .accept(&utterance.session, Some(&utterance.id), category, severity);
        let incident = match accept {
            AcceptOutcome::Opened { incident, accepted_in } => {
                debug!(incident = %incident, accepted_us = accepted_in.as_micros() as u64, "emergency accepted");
                self.sessions
                    .set_active_incident(&utterance.session, incident.clone());
                Some(incident)
            }
            AcceptOutcome::AlreadyActive { incident } => Some(incident),
            AcceptOutcome::Quenched { .. } => None,
        };
        self.sessions.record_utterance(utterance.clone());
        self.respond(
            utterance,
            Phrase::EmergencyAck,
            Urgency::Urgent,
            PipelineOutcome::EmergencyAccepted {
                incident,
                category,
                severity,
            },
        )
    }

    /// LLM stage within the remaining budget, then post-guard + dispatch.
    #[allow(clippy::cast_possible_truncation)]
    async fn resolve_and_dispatch(
        &self,
        utterance: &Utterance,
        session_summary: &str,
        policy: &Arc<PolicySnapshot>,
        budget: &DeadlineBudget,
    ) -> ResponseEnvelope {
        let request = IntentRequest {
            system_prompt_version: self.intent.prompt_version().to_owned(),
            user_text: utterance.text.clone(),
            session_summary: session_summary.to_owned(),
            domain_vocabulary_hash: policy.vocabulary_hash.clone(),
        };
        let deadline = budget.slice(policy.deadlines.llm);
        let started = std::time::Instant::now();

        match self.intent.resolve(&request, deadline).await {
            Ok(intent) => {
                self.audit.emit(
                    AuditDraft::new(utterance.session.as_str(), AuditStage::Intent, "resolved")
                        .with_utterance(utterance.id.as_str())
                        .with_duration_ms(started.elapsed().as_millis() as u64)
                        .with_payload_hash(payload_hash(
                            &serde_json::to_value(&intent).unwrap_or_default(),
                        )),
                );
                self.bus.publish(Event::Intent {
                    utterance: utterance.id.clone(),
                    source: IntentSource::Llm,
                    intent: intent.clone(),
                });
                self.guard_and_dispatch(intent, utterance, policy, budget, false)
                    .await
            }
            Err(err) => {
                // Never fabricate an intent: fall back to a conservative
                // chat response with no side effects.
                warn!(error = %err, "intent stage failed");
                self.audit.emit(
                    AuditDraft::new(utterance.session.as_str(), AuditStage::Intent, err.reason_code())
                        .with_utterance(utterance.id.as_str())
                        .with_duration_ms(started.elapsed().as_millis() as u64),
                );
                self.sessions.record_utterance(utterance.clone());
                self.respond(
                    utterance,
                    Phrase::ChatFallback,
                    Urgency::Normal,
                    PipelineOutcome::IntentFailed {
                        reason: err.reason_code().to_owned(),
                    },
                )
            }
        }
    }

    /// Post-guard, confirmation parking, and adapter dispatch.
    async fn guard_and_dispatch(
        &self,
        intent: Intent,
        utterance: &Utterance,
        policy: &Arc<PolicySnapshot>,
        budget: &DeadlineBudget,
        confirmed: bool,
    ) -> ResponseEnvelope {
        let now = Utc::now();
        let view = self.sessions.view(&utterance.session, now);
        let verdict = post_guard(&intent, &view, policy, &self.limiter);

        self.bus.publish(Event::Guard {
            utterance: utterance.id.clone(),
            stage: GuardStage::Post,
            verdict: verdict.clone(),
        });
        self.audit.emit(
            AuditDraft::new(
                utterance.session.as_str(),
                AuditStage::PostGuard,
                decision_tag(verdict.decision),
            )
            .with_utterance(utterance.id.as_str())
            .with_details(serde_json::json!({
                "reasons": verdict.reasons,
                "constraints": verdict.constraints_violated,
                "confirmed": confirmed,
            }))
            .with_payload_hash(payload_hash(&serde_json::to_value(&intent).unwrap_or_default())),
        );

        match verdict.decision {
            GuardDecision::Deny => {
                let reason = verdict.reasons.first().copied().unwrap_or(DenyReason::ActionNotAllowed);
                self.sessions.record_utterance(utterance.clone());
                self.respond(
                    utterance,
                    Phrase::Deny(reason),
                    Urgency::Calming,
                    PipelineOutcome::Denied { reason },
                )
            }

            GuardDecision::Elevate => {
                let severity = Severity::new(2).unwrap_or(Severity::MAX);
                let accept = self.emergency.accept(
                    &utterance.session,
                    Some(&utterance.id),
                    EmergencyCategory::Elevation,
                    severity,
                );
                let incident = match accept {
                    AcceptOutcome::Opened { incident, .. } => {
                        self.sessions
                            .set_active_incident(&utterance.session, incident.clone());
                        Some(incident)
                    }
                    AcceptOutcome::AlreadyActive { incident } => Some(incident),
                    AcceptOutcome::Quenched { .. } => None,
                };
                self.sessions.record_utterance(utterance.clone());
                self.respond(
                    utterance,
                    Phrase::ElevationAck,
                    Urgency::Calming,
                    PipelineOutcome::EmergencyAccepted {
                        incident,
                        category: EmergencyCategory::Elevation,
                        severity,
                    },
                )
            }

            GuardDecision::AllowWithConfirm if !confirmed => {
                let window = chrono::Duration::from_std(policy.confirm.window)
                    .unwrap_or_else(|_| chrono::Duration::seconds(30));
                let pending = PendingConfirm {
                    intent,
                    created_at: now,
                    expires_at: now + window,
                };
                let expires_at = pending.expires_at;
                self.sessions
                    .set_pending_confirm(&utterance.session, pending);
                self.spawn_confirm_watchdog(utterance, policy.confirm.window, now);
                self.audit.emit(
                    AuditDraft::new(utterance.session.as_str(), AuditStage::Confirm, "pending")
                        .with_utterance(utterance.id.as_str()),
                );
                self.sessions.record_utterance(utterance.clone());
                self.respond(
                    utterance,
                    Phrase::ConfirmPrompt,
                    Urgency::Normal,
                    PipelineOutcome::ConfirmPending { expires_at },
                )
            }

            GuardDecision::Allow | GuardDecision::AllowWithConfirm => {
                self.dispatch(intent, utterance, policy, budget).await
            }
        }
    }

    /// Execute the allowed intent's side effects.
    async fn dispatch(
        &self,
        intent: Intent,
        utterance: &Utterance,
        policy: &Arc<PolicySnapshot>,
        budget: &DeadlineBudget,
    ) -> ResponseEnvelope {
        self.sessions.record_utterance(utterance.clone());

        match &intent {
            Intent::Chat { style } => {
                let phrase = match style {
                    carelink_core::ChatStyle::Cheerful => Phrase::Greeting,
                    _ => Phrase::ChatFallback,
                };
                self.respond(utterance, phrase, Urgency::Normal, PipelineOutcome::ChatReply)
            }

            // The motion stack consumes validated intents from the bus;
            // there is no adapter lane for it in the core.
            Intent::AssistMove { .. } => self.respond(
                utterance,
                Phrase::MoveAck,
                Urgency::Normal,
                PipelineOutcome::Executed { results: vec![] },
            ),

            Intent::SmartHome { device, action, .. } => {
                let job = AdapterJob::new(
                    utterance.session.clone(),
                    AdapterCommand::SmartHome {
                        device: device.clone(),
                        action: action.clone(),
                        params: serde_json::Value::Null,
                    },
                    budget.job_deadline(),
                );
                let risk = policy.device(device).map_or(1, |f| f.risk_level);
                self.finish_jobs(utterance, policy, vec![job], risk, Phrase::ExecutedOk)
                    .await
            }

            Intent::Call { callee, .. } => {
                let Some(contact) = policy.contact_for_role(*callee) else {
                    // The post-guard already vetoed unknown callees.
                    return self.respond(
                        utterance,
                        Phrase::Deny(DenyReason::ContactUnknown),
                        Urgency::Calming,
                        PipelineOutcome::Denied {
                            reason: DenyReason::ContactUnknown,
                        },
                    );
                };
                let job = AdapterJob::new(
                    utterance.session.clone(),
                    AdapterCommand::PlaceCall {
                        contact: contact.clone(),
                        incident: carelink_core::IncidentId::new(format!("call-{}", utterance.id)),
                        step_seq: 0,
                    },
                    budget.job_deadline(),
                );
                self.finish_jobs(utterance, policy, vec![job], 1, Phrase::CallAck)
                    .await
            }
        }
    }

    /// Submit jobs, collect terminal outcomes, map them to a response.
    async fn finish_jobs(
        &self,
        utterance: &Utterance,
        policy: &Arc<PolicySnapshot>,
        jobs: Vec<AdapterJob>,
        risk_level: u8,
        success_phrase: Phrase,
    ) -> ResponseEnvelope {
        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            let kind = job.command.kind();
            let job_id = job.id.clone();
            let outcome = self.executor.submit(job, policy).await;
            self.audit.emit(
                AuditDraft::new(utterance.session.as_str(), AuditStage::Dispatch, outcome_tag(&outcome))
                    .with_utterance(utterance.id.as_str())
                    .with_details(serde_json::to_value(&outcome).unwrap_or_default()),
            );
            let result = AdapterResult {
                job: job_id,
                kind,
                outcome,
            };
            self.bus.publish(Event::Adapter(result.clone()));
            results.push(result);
        }

        if let Some(busy) = results
            .iter()
            .find(|r| matches!(r.outcome, JobOutcome::Busy))
        {
            let kind = busy.kind;
            return self.respond(
                utterance,
                Phrase::Busy,
                Urgency::Normal,
                PipelineOutcome::AdapterBusy { kind },
            );
        }

        let all_ok = results.iter().all(|r| r.outcome.succeeded());
        if all_ok {
            self.respond(
                utterance,
                success_phrase,
                Urgency::Normal,
                PipelineOutcome::Executed { results },
            )
        } else {
            // Safety-critical device failures additionally notify the
            // caregiver rung.
            let permanent = results.iter().any(|r| {
                matches!(&r.outcome, JobOutcome::Failed { error } if !error.retryable)
            });
            if permanent && risk_level >= policy.guard.risk_confirm_threshold {
                self.notify_caregiver_of_failure(utterance, policy);
            }
            self.respond(
                utterance,
                Phrase::Reassure,
                Urgency::Calming,
                PipelineOutcome::Executed { results },
            )
        }
    }

    /// Fire-and-forget caregiver notification about a failed
    /// safety-critical device.
    fn notify_caregiver_of_failure(&self, utterance: &Utterance, policy: &Arc<PolicySnapshot>) {
        let Some(contact) = policy.contact_for_role(carelink_core::Callee::Caregiver) else {
            return;
        };
        let job = AdapterJob::new(
            utterance.session.clone(),
            AdapterCommand::Notify {
                channel: NotifyChannel::Sms,
                recipient: contact.sms_number().to_owned(),
                template: "device_failure".into(),
                fields: std::collections::HashMap::from([(
                    "utterance".to_owned(),
                    utterance.id.to_string(),
                )]),
            },
            std::time::Instant::now() + std::time::Duration::from_secs(30),
        );
        let executor = Arc::clone(&self.executor);
        let policy = Arc::clone(policy);
        self.tracker.spawn(async move {
            executor.submit(job, &policy).await;
        });
    }

    /// Watchdog that logs `confirm_timeout` when a parked intent expires
    /// without a confirming utterance.
    fn spawn_confirm_watchdog(
        &self,
        utterance: &Utterance,
        window: std::time::Duration,
        created_at: chrono::DateTime<Utc>,
    ) {
        let sessions = Arc::clone(&self.sessions);
        let audit = Arc::clone(&self.audit);
        let session = utterance.session.clone();
        self.tracker.spawn(async move {
            tokio::time::sleep(window).await;
            if sessions
                .take_pending_confirm_if_created_at(&session, created_at)
                .is_some()
            {
                audit.emit(AuditDraft::new(
                    session.as_str(),
                    AuditStage::Confirm,
                    "confirm_timeout",
                ));
            }
        });
    }

    /// Assemble the envelope and hand the speech to the TTS lane.
    fn respond(
        &self,
        utterance: &Utterance,
        phrase: Phrase,
        urgency: Urgency,
        outcome: PipelineOutcome,
    ) -> ResponseEnvelope {
        let speech = match urgency {
            Urgency::Urgent => SpeechEnvelope::urgent(phrase.text(utterance.language), utterance.language),
            Urgency::Calming => SpeechEnvelope::calming(phrase.text(utterance.language), utterance.language),
            Urgency::Normal => SpeechEnvelope::normal(phrase.text(utterance.language), utterance.language),
        };
        self.speak(utterance, speech.clone());
        ResponseEnvelope {
            utterance: utterance.id.clone(),
            speech,
            outcome,
        }
    }

    /// Submit the speech job without blocking the response path.
    fn speak(&self, utterance: &Utterance, envelope: SpeechEnvelope) {
        let mut job = AdapterJob::new(
            utterance.session.clone(),
            AdapterCommand::Speak { envelope: envelope.clone() },
            std::time::Instant::now() + std::time::Duration::from_secs(5),
        );
        if envelope.urgency == Urgency::Urgent {
            job.priority = JobPriority::Emergency;
            job.idempotency_key = Some(format!("speak-{}", utterance.id));
        }
        let executor = Arc::clone(&self.executor);
        let policy = self.policy.current();
        self.tracker.spawn(async move {
            executor.submit(job, &policy).await;
        });
    }
}

fn decision_tag(decision: GuardDecision) -> &'static str {
    match decision {
        GuardDecision::Allow => "allow",
        GuardDecision::AllowWithConfirm => "allow_with_confirm",
        GuardDecision::Deny => "deny",
        GuardDecision::Elevate => "elevate",
    }
}

fn kind_tag(classification: &Classification) -> &'static str {
    match classification.kind {
        ClassificationKind::Emergency { .. } => "emergency",
        ClassificationKind::DirectIntent { .. } => "direct_intent",
        ClassificationKind::RouteToLlm => "route_to_llm",
        ClassificationKind::Reject { .. } => "reject",
    }
}

fn outcome_tag(outcome: &JobOutcome) -> &'static str {
    match outcome {
        JobOutcome::Completed { .. } => "executed",
        JobOutcome::Failed { .. } => "failed",
        JobOutcome::Busy => "busy",
        JobOutcome::Duplicate => "duplicate",
    }
}
