//! The plug-in contract between the orchestrator and each domain expert.
//!
//! Vehicle scoring heuristics, financial formulas, sentiment analysis, and
//! the collaborative-filtering model are all external collaborators from
//! this crate's point of view (see SPEC_FULL.md §1) — an `Analyzer` is
//! nothing more than an id, a display name, and one `analyze` call.

use async_trait::async_trait;
use reco_types::{Candidate, UserProfile};

/// Context handed to an analyzer for the duration of one call. Carries the
/// session id for log correlation; analyzers have no access to the
/// EventBus or to the orchestrator's internals beyond this.
#[derive(Debug, Clone)]
pub struct AnalyzerContext {
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct AnalyzerOutput {
    pub candidates: Vec<Candidate>,
    pub confidence: f64,
}

/// An analyzer failure. Analyzers report domain-specific reasons; the
/// runner is responsible for mapping any failure (including a panic) onto
/// the error taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
#[error("analyzer failed: {0}")]
pub struct AnalyzerError(pub String);

/// A registered domain expert or predictor. `id` is the stable routing key
/// used in events and in fusion's per-source accounting; `display_name` is
/// for human-facing surfaces only.
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    async fn analyze(
        &self,
        profile: &UserProfile,
        ctx: &AnalyzerContext,
    ) -> Result<AnalyzerOutput, AnalyzerError>;
}
