//! Shared data types for the vehicle recommendation orchestrator.
//!
//! This crate carries no logic — only the wire/data shapes that `reco-core`
//! and `reco-server` pass between each other and across the HTTP boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Clamp a score or confidence into `[0, 1]`.
pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub brands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    General,
    Family,
    Business,
    Leisure,
}

/// A recommendation request's input. Recognized fields are typed; anything
/// else the client sends is preserved verbatim in `extra` so analyzers that
/// know about a field this crate doesn't can still see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub budget: Budget,
    #[serde(default)]
    pub preferences: Preferences,
    pub purpose: Purpose,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub vehicle_id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Candidate {
    pub fn new(vehicle_id: impl Into<String>, score: f64) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            score: clamp01(score),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// The closed error taxonomy from the error-handling design, carried on the
/// wire so stream/HTTP clients can branch on it without parsing prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NoSuchSession,
    Timeout,
    Cancelled,
    AnalyzerError,
    InternalError,
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub agent: String,
    pub status: ResultStatus,
    pub confidence: f64,
    pub candidates: Vec<Candidate>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl AgentResult {
    pub fn ok(agent: impl Into<String>, confidence: f64, candidates: Vec<Candidate>, duration_ms: u64) -> Self {
        Self {
            agent: agent.into(),
            status: ResultStatus::Ok,
            confidence: clamp01(confidence),
            candidates,
            duration_ms,
            error_kind: None,
        }
    }

    pub fn err(agent: impl Into<String>, kind: ErrorKind, duration_ms: u64) -> Self {
        Self {
            agent: agent.into(),
            status: ResultStatus::Error,
            confidence: 0.0,
            candidates: Vec::new(),
            duration_ms,
            error_kind: Some(kind),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ResultStatus::Ok)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorResult {
    pub predictor: String,
    pub status: ResultStatus,
    pub confidence: f64,
    pub candidates: Vec<Candidate>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl PredictorResult {
    pub fn ok(predictor: impl Into<String>, confidence: f64, candidates: Vec<Candidate>, duration_ms: u64) -> Self {
        Self {
            predictor: predictor.into(),
            status: ResultStatus::Ok,
            confidence: clamp01(confidence),
            candidates,
            duration_ms,
            error_kind: None,
        }
    }

    pub fn err(predictor: impl Into<String>, kind: ErrorKind, duration_ms: u64) -> Self {
        Self {
            predictor: predictor.into(),
            status: ResultStatus::Error,
            confidence: 0.0,
            candidates: Vec::new(),
            duration_ms,
            error_kind: Some(kind),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ResultStatus::Ok)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalCandidate {
    pub vehicle_id: String,
    pub final_score: f64,
    pub contributing_sources: Vec<String>,
    pub per_source_scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedResult {
    pub candidates: Vec<FinalCandidate>,
    pub fusion_method: String,
    pub per_source_contribution: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictor_contribution: Option<f64>,
}

impl FusedResult {
    pub fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            fusion_method: "empty".to_string(),
            per_source_contribution: BTreeMap::new(),
            predictor_contribution: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Starting,
    Analyzing,
    Completed,
    Error,
}

/// The ordered, append-only stream of everything that happens within a
/// session. Every variant carries the session id and a monotonic timestamp
/// so a subscriber joining mid-stream can still make sense of ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ConnectionEstablished {
        session_id: String,
        timestamp_ms: i64,
    },
    CollaborationStarted {
        session_id: String,
        timestamp_ms: i64,
    },
    AgentProgress {
        session_id: String,
        timestamp_ms: i64,
        agent: String,
        status: AgentStatus,
        progress: f64,
        message: String,
    },
    PredictorProgress {
        session_id: String,
        timestamp_ms: i64,
        predictor: String,
        status: AgentStatus,
        progress: f64,
        message: String,
    },
    PredictorCompleted {
        session_id: String,
        timestamp_ms: i64,
        predictor: String,
        result: PredictorResult,
    },
    PredictorError {
        session_id: String,
        timestamp_ms: i64,
        predictor: String,
        kind: ErrorKind,
        message: String,
    },
    FusionStarted {
        session_id: String,
        timestamp_ms: i64,
    },
    FusionProgress {
        session_id: String,
        timestamp_ms: i64,
        message: String,
    },
    FusionCompleted {
        session_id: String,
        timestamp_ms: i64,
        result: FusedResult,
    },
    RecommendationCompleted {
        session_id: String,
        timestamp_ms: i64,
        result: FusedResult,
    },
    Error {
        session_id: String,
        timestamp_ms: i64,
        kind: ErrorKind,
        message: String,
    },
    KeepAlive {
        session_id: String,
        timestamp_ms: i64,
    },
}

impl Event {
    pub fn session_id(&self) -> &str {
        match self {
            Event::ConnectionEstablished { session_id, .. }
            | Event::CollaborationStarted { session_id, .. }
            | Event::AgentProgress { session_id, .. }
            | Event::PredictorProgress { session_id, .. }
            | Event::PredictorCompleted { session_id, .. }
            | Event::PredictorError { session_id, .. }
            | Event::FusionStarted { session_id, .. }
            | Event::FusionProgress { session_id, .. }
            | Event::FusionCompleted { session_id, .. }
            | Event::RecommendationCompleted { session_id, .. }
            | Event::Error { session_id, .. }
            | Event::KeepAlive { session_id, .. } => session_id,
        }
    }

    /// The wire tag, matching the `type` field used in the tagged
    /// serialization above — kept in sync by `event_type_matches_tag` in
    /// the test module.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ConnectionEstablished { .. } => "connection_established",
            Event::CollaborationStarted { .. } => "collaboration_started",
            Event::AgentProgress { .. } => "agent_progress",
            Event::PredictorProgress { .. } => "predictor_progress",
            Event::PredictorCompleted { .. } => "predictor_completed",
            Event::PredictorError { .. } => "predictor_error",
            Event::FusionStarted { .. } => "fusion_started",
            Event::FusionProgress { .. } => "fusion_progress",
            Event::FusionCompleted { .. } => "fusion_completed",
            Event::RecommendationCompleted { .. } => "recommendation_completed",
            Event::Error { .. } => "error",
            Event::KeepAlive { .. } => "keep_alive",
        }
    }

    /// Terminal events end a session: no event may follow one (I2).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::RecommendationCompleted { .. } | Event::Error { .. })
    }
}
