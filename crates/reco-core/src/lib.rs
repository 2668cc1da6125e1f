//! Orchestration and fusion engine for the vehicle recommendation system.
//!
//! This crate is transport-agnostic: `reco-server` is the only consumer
//! that knows about HTTP/SSE. Everything here operates on plain
//! `reco-types` values and a cancellation token.

pub mod analyzer;
pub mod analyzers;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod fuser;
pub mod orchestrator;
pub mod runner;

use std::sync::Arc;

use analyzer::Analyzer;

/// Builds the in-process registry of reference analyzers and predictor
/// this system ships with. Not a plugin-loading mechanism — dynamic
/// loading of external analyzer binaries is out of scope.
pub fn default_registry() -> (Vec<Arc<dyn Analyzer>>, Arc<dyn Analyzer>) {
    let agents: Vec<Arc<dyn Analyzer>> = vec![
        Arc::new(analyzers::VehicleAnalyzer),
        Arc::new(analyzers::FinanceAnalyzer),
        Arc::new(analyzers::ReviewAnalyzer),
    ];
    let predictor: Arc<dyn Analyzer> = Arc::new(analyzers::CollaborativePredictor);
    (agents, predictor)
}
