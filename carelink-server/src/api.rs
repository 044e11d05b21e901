//! The control surface: utterance ingress for the ASR edge, policy
//! reload, snapshot dump, drain, synthetic emergencies, call-status
//! callbacks, and audit queries.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing::info;

use carelink_audit::{AuditQuery, AuditStore};
use carelink_core::{
    EmergencyCategory, Language, ResponseEnvelope, SessionId, Severity, Utterance,
};
use carelink_emergency::{AcceptOutcome, CallAck};
use carelink_orchestrator::Orchestrator;

/// Shared state behind the control routes.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub audit_store: Arc<dyn AuditStore>,
    /// Signalled when a drain is requested over HTTP.
    pub shutdown: Arc<Notify>,
    /// Adapter kinds that failed their startup probe.
    pub degraded: Vec<String>,
}

/// Build the control router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/utterance", post(utterance))
        .route("/v1/policy/reload", post(reload_policy))
        .route("/v1/snapshot", get(snapshot))
        .route("/v1/drain", post(drain))
        .route("/v1/test-emergency", post(test_emergency))
        .route("/v1/callbacks/call", post(call_callback))
        .route("/v1/location", post(location))
        .route("/v1/emotion", post(emotion))
        .route("/v1/audit", get(audit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": if state.degraded.is_empty() { "ok" } else { "degraded" },
        "degraded": state.degraded,
    }))
}

/// The audio-in event from the ASR collaborator.
#[derive(Debug, Deserialize)]
struct AudioIn {
    utterance_id: String,
    #[serde(default)]
    session_id: Option<String>,
    text: String,
    language: Language,
    asr_conf: f32,
    #[serde(default)]
    t_arrival_ms: Option<i64>,
    #[serde(default)]
    speaker_profile_id: Option<String>,
}

async fn utterance(
    State(state): State<AppState>,
    Json(audio): Json<AudioIn>,
) -> Json<ResponseEnvelope> {
    // The session is the speaker when the edge does not track one.
    let session = audio
        .session_id
        .or_else(|| audio.speaker_profile_id.clone())
        .unwrap_or_else(|| "default".to_owned());

    let mut utt = Utterance::new(
        audio.utterance_id,
        session,
        audio.text,
        audio.language,
        audio.asr_conf,
    );
    if let Some(ms) = audio.t_arrival_ms {
        if let Some(t) = DateTime::<Utc>::from_timestamp_millis(ms) {
            utt.t_arrival = t;
        }
    }
    if let Some(profile) = audio.speaker_profile_id {
        utt = utt.with_speaker_profile(profile);
    }

    Json(state.orchestrator.handle_utterance(utt).await)
}

async fn reload_policy(State(state): State<AppState>) -> Response {
    match state.orchestrator.policy().reload() {
        Ok(version) => Json(serde_json::json!({"version": version})).into_response(),
        Err(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}

async fn snapshot(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.orchestrator.policy().current();
    Json(serde_json::json!({
        "version": snapshot.version,
        "vocabulary_hash": snapshot.vocabulary_hash,
        "devices": snapshot.devices.keys().map(ToString::to_string).collect::<Vec<_>>(),
        "ladder": snapshot.ladder.iter().map(|r| r.contact.id.to_string()).collect::<Vec<_>>(),
        "zones": snapshot.zones.iter().map(|z| z.id.to_string()).collect::<Vec<_>>(),
        "sos_sets": snapshot.sos.len(),
    }))
}

async fn drain(State(state): State<AppState>) -> StatusCode {
    info!("drain requested over control surface");
    state.orchestrator.begin_drain();
    state.shutdown.notify_waiters();
    StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
struct TestEmergency {
    category: EmergencyCategory,
    severity: u8,
}

#[derive(Debug, Serialize)]
struct TestEmergencyReply {
    outcome: String,
    incident: Option<String>,
}

async fn test_emergency(
    State(state): State<AppState>,
    Json(req): Json<TestEmergency>,
) -> Response {
    let Some(severity) = Severity::new(req.severity) else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "severity outside 1..=4"})),
        )
            .into_response();
    };

    let session = SessionId::new("synthetic-test");
    let accept = state
        .orchestrator
        .emergency()
        .accept(&session, None, req.category, severity);
    let reply = match accept {
        AcceptOutcome::Opened { incident, .. } => TestEmergencyReply {
            outcome: "opened".into(),
            incident: Some(incident.to_string()),
        },
        AcceptOutcome::AlreadyActive { incident } => TestEmergencyReply {
            outcome: "already_active".into(),
            incident: Some(incident.to_string()),
        },
        AcceptOutcome::Quenched { .. } => TestEmergencyReply {
            outcome: "quenched".into(),
            incident: None,
        },
    };
    Json(reply).into_response()
}

async fn call_callback(State(state): State<AppState>, Json(ack): Json<CallAck>) -> StatusCode {
    if state.orchestrator.emergency().deliver_ack(ack) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// A geofence reading from the location collaborator.
#[derive(Debug, Deserialize)]
struct LocationIn {
    session_id: String,
    x: f64,
    y: f64,
}

async fn location(State(state): State<AppState>, Json(reading): Json<LocationIn>) -> Response {
    let snapshot = state.orchestrator.policy().current();
    let point = carelink_policy::Point::new(reading.x, reading.y);
    match carelink_policy::locate(&snapshot.zones, point) {
        Some(zone) => {
            let session = SessionId::new(reading.session_id);
            state.orchestrator.sessions().record_zone(&session, zone.clone());
            Json(serde_json::json!({"zone": zone.as_str()})).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"zone": null})),
        )
            .into_response(),
    }
}

/// An emotion reading from the affect collaborator.
#[derive(Debug, Deserialize)]
struct EmotionIn {
    session_id: String,
    stress: f32,
    #[serde(default)]
    label: Option<String>,
}

async fn emotion(State(state): State<AppState>, Json(reading): Json<EmotionIn>) -> StatusCode {
    let mut emotion = carelink_core::EmotionReading::new(reading.stress);
    if let Some(label) = reading.label {
        emotion = emotion.with_label(label);
    }
    state
        .orchestrator
        .sessions()
        .record_emotion(&SessionId::new(reading.session_id), emotion);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct AuditParams {
    #[serde(default)]
    session: Option<String>,
    #[serde(default)]
    incident: Option<String>,
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn audit(State(state): State<AppState>, Query(params): Query<AuditParams>) -> Response {
    let query = AuditQuery {
        session: params.session.map(SessionId::new),
        incident: params.incident.map(carelink_core::IncidentId::new),
        outcome: params.outcome,
        limit: params.limit,
        ..AuditQuery::default()
    };
    match state.audit_store.query(&query).await {
        Ok(records) => Json(records).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_in_accepts_spec_shape() {
        let raw = r#"{
            "utterance_id": "u-1",
            "text": "救命",
            "language": "zh",
            "asr_conf": 0.92,
            "t_arrival_ms": 1722500000000,
            "speaker_profile_id": "elder-primary"
        }"#;
        let audio: AudioIn = serde_json::from_str(raw).unwrap();
        assert_eq!(audio.utterance_id, "u-1");
        assert!(audio.session_id.is_none());
        assert_eq!(audio.speaker_profile_id.as_deref(), Some("elder-primary"));
    }

    #[test]
    fn test_emergency_shape() {
        let raw = r#"{"category": "fall", "severity": 3}"#;
        let req: TestEmergency = serde_json::from_str(raw).unwrap();
        assert_eq!(req.category, EmergencyCategory::Fall);
        assert_eq!(req.severity, 3);
    }
}
