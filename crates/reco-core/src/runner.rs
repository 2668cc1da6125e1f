//! Runs one analyzer (or the predictor) under a watchdog and surfaces its
//! lifecycle as events. Grounded on the orchestrator engine's execution
//! loop: a spawned task polled alongside a deadline and a cancellation
//! signal, with the handle aborted on either so the analyzer never
//! outlives the runner that started it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reco_types::{AgentResult, AgentStatus, Candidate, ErrorKind, Event, PredictorResult, UserProfile};
use tokio_util::sync::CancellationToken;

use crate::analyzer::{Analyzer, AnalyzerContext, AnalyzerOutput};
use crate::event_bus::EventBus;

enum Outcome {
    Ok(AnalyzerOutput),
    Cancelled,
    Timeout,
    AnalyzerFailed(String),
    Panicked,
}

async fn execute_with_watchdog(
    analyzer: Arc<dyn Analyzer>,
    profile: UserProfile,
    ctx: AnalyzerContext,
    deadline: Duration,
    cancellation: CancellationToken,
) -> (Outcome, Duration) {
    let started = Instant::now();
    let mut handle = tokio::spawn(async move { analyzer.analyze(&profile, &ctx).await });

    let outcome = tokio::select! {
        _ = cancellation.cancelled() => {
            handle.abort();
            Outcome::Cancelled
        }
        res = tokio::time::timeout(deadline, &mut handle) => match res {
            Err(_elapsed) => {
                handle.abort();
                Outcome::Timeout
            }
            Ok(Ok(Ok(output))) => Outcome::Ok(output),
            Ok(Ok(Err(err))) => Outcome::AnalyzerFailed(err.0),
            Ok(Err(join_err)) => {
                if join_err.is_cancelled() {
                    Outcome::Cancelled
                } else {
                    Outcome::Panicked
                }
            }
        },
    };

    (outcome, started.elapsed())
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

/// Executes one registered analyzer against a profile.
pub struct AgentRunner;

impl AgentRunner {
    pub async fn run(
        analyzer: Arc<dyn Analyzer>,
        profile: UserProfile,
        session_id: &str,
        bus: &EventBus,
        deadline: Duration,
        cancellation: CancellationToken,
    ) -> AgentResult {
        let agent_id = analyzer.id().to_string();

        bus.publish(
            session_id,
            Event::AgentProgress {
                session_id: session_id.to_string(),
                timestamp_ms: now_ms(),
                agent: agent_id.clone(),
                status: AgentStatus::Starting,
                progress: 0.0,
                message: format!("{} starting", analyzer.display_name()),
            },
        )
        .await;

        let ctx = AnalyzerContext {
            session_id: session_id.to_string(),
        };
        let (outcome, duration) =
            execute_with_watchdog(analyzer.clone(), profile, ctx, deadline, cancellation).await;

        match outcome {
            Outcome::Ok(output) => {
                bus.publish(
                    session_id,
                    Event::AgentProgress {
                        session_id: session_id.to_string(),
                        timestamp_ms: now_ms(),
                        agent: agent_id.clone(),
                        status: AgentStatus::Completed,
                        progress: 1.0,
                        message: "completed".to_string(),
                    },
                )
                .await;
                AgentResult::ok(agent_id, output.confidence, clamp_candidates(output.candidates), duration_ms(duration))
            }
            Outcome::Cancelled => {
                emit_agent_error(bus, session_id, &agent_id, "cancelled").await;
                AgentResult::err(agent_id, ErrorKind::Cancelled, duration_ms(duration))
            }
            Outcome::Timeout => {
                emit_agent_error(bus, session_id, &agent_id, "timeout").await;
                AgentResult::err(agent_id, ErrorKind::Timeout, duration_ms(duration))
            }
            Outcome::AnalyzerFailed(message) => {
                emit_agent_error(bus, session_id, &agent_id, &message).await;
                AgentResult::err(agent_id, ErrorKind::AnalyzerError, duration_ms(duration))
            }
            Outcome::Panicked => {
                emit_agent_error(bus, session_id, &agent_id, "internal error").await;
                AgentResult::err(agent_id, ErrorKind::InternalError, duration_ms(duration))
            }
        }
    }
}

async fn emit_agent_error(bus: &EventBus, session_id: &str, agent_id: &str, message: &str) {
    bus.publish(
        session_id,
        Event::AgentProgress {
            session_id: session_id.to_string(),
            timestamp_ms: now_ms(),
            agent: agent_id.to_string(),
            status: AgentStatus::Error,
            progress: 0.0,
            message: message.to_string(),
        },
    )
    .await;
}

/// Same shape as `AgentRunner`, but routed through the `predictor_*` event
/// types so a stream consumer can tell the collaborative-filtering
/// predictor apart from the domain-expert agents.
pub struct PredictorRunner;

impl PredictorRunner {
    pub async fn run(
        analyzer: Arc<dyn Analyzer>,
        profile: UserProfile,
        session_id: &str,
        bus: &EventBus,
        deadline: Duration,
        cancellation: CancellationToken,
    ) -> PredictorResult {
        let predictor_id = analyzer.id().to_string();

        bus.publish(
            session_id,
            Event::PredictorProgress {
                session_id: session_id.to_string(),
                timestamp_ms: now_ms(),
                predictor: predictor_id.clone(),
                status: AgentStatus::Starting,
                progress: 0.0,
                message: format!("{} starting", analyzer.display_name()),
            },
        )
        .await;

        let ctx = AnalyzerContext {
            session_id: session_id.to_string(),
        };
        let (outcome, duration) =
            execute_with_watchdog(analyzer.clone(), profile, ctx, deadline, cancellation).await;

        match outcome {
            Outcome::Ok(output) => {
                let result = PredictorResult::ok(
                    predictor_id.clone(),
                    output.confidence,
                    clamp_candidates(output.candidates),
                    duration_ms(duration),
                );
                bus.publish(
                    session_id,
                    Event::PredictorCompleted {
                        session_id: session_id.to_string(),
                        timestamp_ms: now_ms(),
                        predictor: predictor_id,
                        result: result.clone(),
                    },
                )
                .await;
                result
            }
            Outcome::Cancelled => {
                emit_predictor_error(bus, session_id, &predictor_id, ErrorKind::Cancelled, "cancelled").await;
                PredictorResult::err(predictor_id, ErrorKind::Cancelled, duration_ms(duration))
            }
            Outcome::Timeout => {
                emit_predictor_error(bus, session_id, &predictor_id, ErrorKind::Timeout, "timeout").await;
                PredictorResult::err(predictor_id, ErrorKind::Timeout, duration_ms(duration))
            }
            Outcome::AnalyzerFailed(message) => {
                emit_predictor_error(bus, session_id, &predictor_id, ErrorKind::AnalyzerError, &message).await;
                PredictorResult::err(predictor_id, ErrorKind::AnalyzerError, duration_ms(duration))
            }
            Outcome::Panicked => {
                emit_predictor_error(bus, session_id, &predictor_id, ErrorKind::InternalError, "internal error").await;
                PredictorResult::err(predictor_id, ErrorKind::InternalError, duration_ms(duration))
            }
        }
    }
}

async fn emit_predictor_error(
    bus: &EventBus,
    session_id: &str,
    predictor_id: &str,
    kind: ErrorKind,
    message: &str,
) {
    bus.publish(
        session_id,
        Event::PredictorError {
            session_id: session_id.to_string(),
            timestamp_ms: now_ms(),
            predictor: predictor_id.to_string(),
            kind,
            message: message.to_string(),
        },
    )
    .await;
}

fn clamp_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .map(|c| Candidate {
            score: reco_types::clamp01(c.score),
            ..c
        })
        .collect()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzerError;
    use crate::config::OrchestratorConfig;
    use async_trait::async_trait;
    use reco_types::{Budget, Preferences, Purpose};

    fn profile() -> UserProfile {
        UserProfile {
            budget: Budget { min: 5000.0, max: 20000.0 },
            preferences: Preferences::default(),
            purpose: Purpose::General,
            extra: serde_json::Map::new(),
        }
    }

    struct Instant1sAnalyzer;
    #[async_trait]
    impl Analyzer for Instant1sAnalyzer {
        fn id(&self) -> &str {
            "vehicle"
        }
        fn display_name(&self) -> &str {
            "Vehicle Matcher"
        }
        async fn analyze(&self, _profile: &UserProfile, _ctx: &AnalyzerContext) -> Result<AnalyzerOutput, AnalyzerError> {
            Ok(AnalyzerOutput {
                candidates: vec![Candidate::new("v1", 0.9)],
                confidence: 0.8,
            })
        }
    }

    struct FailingAnalyzer;
    #[async_trait]
    impl Analyzer for FailingAnalyzer {
        fn id(&self) -> &str {
            "finance"
        }
        fn display_name(&self) -> &str {
            "Finance"
        }
        async fn analyze(&self, _profile: &UserProfile, _ctx: &AnalyzerContext) -> Result<AnalyzerOutput, AnalyzerError> {
            Err(AnalyzerError("bad data".into()))
        }
    }

    struct SleepyAnalyzer(Duration);
    #[async_trait]
    impl Analyzer for SleepyAnalyzer {
        fn id(&self) -> &str {
            "review"
        }
        fn display_name(&self) -> &str {
            "Review"
        }
        async fn analyze(&self, _profile: &UserProfile, _ctx: &AnalyzerContext) -> Result<AnalyzerOutput, AnalyzerError> {
            tokio::time::sleep(self.0).await;
            Ok(AnalyzerOutput { candidates: vec![], confidence: 1.0 })
        }
    }

    struct PanickingAnalyzer;
    #[async_trait]
    impl Analyzer for PanickingAnalyzer {
        fn id(&self) -> &str {
            "panicker"
        }
        fn display_name(&self) -> &str {
            "Panicker"
        }
        async fn analyze(&self, _profile: &UserProfile, _ctx: &AnalyzerContext) -> Result<AnalyzerOutput, AnalyzerError> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn successful_run_ends_in_completed() {
        let bus = EventBus::new(OrchestratorConfig::default());
        let mut sub = bus.subscribe("s1").await;
        let result = AgentRunner::run(
            Arc::new(Instant1sAnalyzer),
            profile(),
            "s1",
            &bus,
            Duration::from_secs(5),
            CancellationToken::new(),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(result.confidence, 0.8);

        sub.recv().await; // connection_established
        let starting = sub.recv().await.unwrap();
        assert_eq!(starting.event_type(), "agent_progress");
        let completed = sub.recv().await.unwrap();
        assert_eq!(completed.event_type(), "agent_progress");
    }

    #[tokio::test]
    async fn analyzer_failure_is_reported_as_analyzer_error() {
        let bus = EventBus::new(OrchestratorConfig::default());
        let result = AgentRunner::run(
            Arc::new(FailingAnalyzer),
            profile(),
            "s1",
            &bus,
            Duration::from_secs(5),
            CancellationToken::new(),
        )
        .await;
        assert!(!result.is_ok());
        assert_eq!(result.error_kind, Some(ErrorKind::AnalyzerError));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_reported_as_timeout() {
        let bus = EventBus::new(OrchestratorConfig::default());
        let handle = tokio::spawn(async move {
            AgentRunner::run(
                Arc::new(SleepyAnalyzer(Duration::from_secs(30))),
                profile(),
                "s1",
                &bus,
                Duration::from_millis(100),
                CancellationToken::new(),
            )
            .await
        });
        tokio::time::advance(Duration::from_millis(150)).await;
        let result = handle.await.unwrap();
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn panic_inside_analyzer_is_caught_as_internal_error() {
        let bus = EventBus::new(OrchestratorConfig::default());
        let result = AgentRunner::run(
            Arc::new(PanickingAnalyzer),
            profile(),
            "s1",
            &bus,
            Duration::from_secs(5),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(result.error_kind, Some(ErrorKind::InternalError));
    }

    #[tokio::test]
    async fn cancellation_before_completion_is_reported_as_cancelled() {
        let bus = EventBus::new(OrchestratorConfig::default());
        let token = CancellationToken::new();
        let token_clone = token.clone();
        let handle = tokio::spawn(async move {
            AgentRunner::run(
                Arc::new(SleepyAnalyzer(Duration::from_secs(30))),
                profile(),
                "s1",
                &bus,
                Duration::from_secs(60),
                token_clone,
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let result = handle.await.unwrap();
        assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    }
}
