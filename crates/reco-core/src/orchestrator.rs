//! Glue from a recommendation request to its terminal event. Fans the
//! registered analyzers and the predictor out as independent tasks,
//! awaits all of them (never races), then fuses and publishes the result.
//!
//! Grounded on the orchestrator engine's execution loop: a `JoinSet` polled
//! alongside a cancellation token, with `abort_all` on cancellation. This
//! orchestrator's runners are a fixed fan-out rather than a dependency
//! graph, so there is no scheduler/cycle-detection step to carry over.

use std::sync::Arc;

use reco_types::{AgentResult, ErrorKind, Event, FusedResult, PredictorResult, UserProfile};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::analyzer::Analyzer;
use crate::config::OrchestratorConfig;
use crate::error::RecoError;
use crate::event_bus::EventBus;
use crate::fuser;
use crate::runner::{AgentRunner, PredictorRunner};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Owns the registry of analyzers and predictor this process was started
/// with, plus a handle to the shared `EventBus`.
#[derive(Clone)]
pub struct Orchestrator {
    bus: EventBus,
    config: OrchestratorConfig,
    agents: Vec<Arc<dyn Analyzer>>,
    predictor: Option<Arc<dyn Analyzer>>,
}

impl Orchestrator {
    pub fn new(bus: EventBus, config: OrchestratorConfig, agents: Vec<Arc<dyn Analyzer>>, predictor: Option<Arc<dyn Analyzer>>) -> Self {
        Self {
            bus,
            config,
            agents,
            predictor,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Runs one full recommendation request to completion: opens the
    /// session, fans all runners out concurrently, awaits all of them,
    /// fuses, and publishes the terminal event.
    pub async fn recommend(
        &self,
        profile: UserProfile,
        session_id: &str,
        cancellation: CancellationToken,
    ) -> Result<FusedResult, RecoError> {
        self.bus.open(session_id).await;
        self.bus
            .publish(
                session_id,
                Event::CollaborationStarted {
                    session_id: session_id.to_string(),
                    timestamp_ms: now_ms(),
                },
            )
            .await;

        let deadline = self.config.runner_deadline();
        let mut agent_tasks: JoinSet<AgentResult> = JoinSet::new();
        for analyzer in &self.agents {
            let analyzer = analyzer.clone();
            let profile = profile.clone();
            let session_id = session_id.to_string();
            let bus = self.bus.clone();
            let token = cancellation.clone();
            agent_tasks.spawn(async move { AgentRunner::run(analyzer, profile, &session_id, &bus, deadline, token).await });
        }

        let mut predictor_task: Option<tokio::task::JoinHandle<PredictorResult>> = None;
        if let Some(predictor) = &self.predictor {
            let predictor = predictor.clone();
            let profile = profile.clone();
            let session_id = session_id.to_string();
            let bus = self.bus.clone();
            let token = cancellation.clone();
            predictor_task = Some(tokio::spawn(async move {
                PredictorRunner::run(predictor, profile, &session_id, &bus, deadline, token).await
            }));
        }

        let mut agent_results = Vec::with_capacity(self.agents.len());
        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    agent_tasks.abort_all();
                    if let Some(handle) = &predictor_task {
                        handle.abort();
                    }
                    self.publish_cancelled(session_id).await;
                    return Err(RecoError::Cancelled);
                }
                joined = agent_tasks.join_next() => {
                    match joined {
                        Some(Ok(result)) => agent_results.push(result),
                        Some(Err(join_err)) if join_err.is_cancelled() => {}
                        Some(Err(join_err)) => {
                            tracing::error!(error = %join_err, "orchestrator.agent_task_join_error");
                        }
                        None => break,
                    }
                }
            }
        }

        let predictor_result = match predictor_task {
            Some(handle) => {
                tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => {
                        handle.abort();
                        self.publish_cancelled(session_id).await;
                        return Err(RecoError::Cancelled);
                    }
                    joined = handle => joined.ok(),
                }
            }
            None => None,
        };

        if cancellation.is_cancelled() {
            self.publish_cancelled(session_id).await;
            return Err(RecoError::Cancelled);
        }

        self.bus
            .publish(
                session_id,
                Event::FusionStarted {
                    session_id: session_id.to_string(),
                    timestamp_ms: now_ms(),
                },
            )
            .await;

        let fused = fuser::fuse(&agent_results, predictor_result.as_ref(), &self.config);

        self.bus
            .publish(
                session_id,
                Event::FusionCompleted {
                    session_id: session_id.to_string(),
                    timestamp_ms: now_ms(),
                    result: fused.clone(),
                },
            )
            .await;

        self.bus
            .publish(
                session_id,
                Event::RecommendationCompleted {
                    session_id: session_id.to_string(),
                    timestamp_ms: now_ms(),
                    result: fused.clone(),
                },
            )
            .await;
        self.bus.close(session_id).await;

        Ok(fused)
    }

    async fn publish_cancelled(&self, session_id: &str) {
        self.bus
            .publish(
                session_id,
                Event::Error {
                    session_id: session_id.to_string(),
                    timestamp_ms: now_ms(),
                    kind: ErrorKind::Cancelled,
                    message: "orchestration cancelled".to_string(),
                },
            )
            .await;
        self.bus.close(session_id).await;
    }
}
