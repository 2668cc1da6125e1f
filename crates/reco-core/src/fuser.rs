//! Deterministic merge of agent and predictor outputs into a single ranked
//! list. The arithmetic is pinned by the specification: weight is the
//! arithmetic mean of contributing confidences, score is the
//! confidence-weighted average of contributing scores, and candidates are
//! ranked by the product `weight x score`. Any implementation given the
//! same inputs produces the same numeric output.

use std::collections::BTreeMap;

use reco_types::{AgentResult, Candidate, FinalCandidate, FusedResult, PredictorResult};

use crate::config::OrchestratorConfig;

/// One source's contribution to a single vehicle id, before deduplication.
struct Contribution {
    source: String,
    score: f64,
    weight: f64,
}

/// Merges zero or more `AgentResult`s and at most one `PredictorResult`
/// into a `FusedResult`, per the algorithm in the component design.
pub fn fuse(
    agent_results: &[AgentResult],
    predictor_result: Option<&PredictorResult>,
    config: &OrchestratorConfig,
) -> FusedResult {
    let mut per_source_contribution = BTreeMap::new();
    let mut predictor_contribution = None;
    let mut raw: Vec<(String, Contribution)> = Vec::new();

    for result in agent_results {
        if !result.is_ok() {
            continue;
        }
        per_source_contribution.insert(result.agent.clone(), result.confidence);
        collect(&mut raw, &result.agent, &result.candidates, result.confidence, config.per_source_take);
    }

    if let Some(predictor) = predictor_result {
        if predictor.is_ok() {
            predictor_contribution = Some(predictor.confidence);
            collect(
                &mut raw,
                &predictor.predictor,
                &predictor.candidates,
                predictor.confidence,
                config.per_source_take,
            );
        }
    }

    if raw.is_empty() {
        return FusedResult {
            candidates: Vec::new(),
            fusion_method: "empty".to_string(),
            per_source_contribution,
            predictor_contribution,
        };
    }

    // Group by vehicle id, in first-seen order, preserving per-source
    // detail needed for the mean/weighted-average reduction below.
    let mut order: Vec<String> = Vec::new();
    let mut grouped: BTreeMap<String, Vec<Contribution>> = BTreeMap::new();
    for (vehicle_id, contribution) in raw {
        if !grouped.contains_key(&vehicle_id) {
            order.push(vehicle_id.clone());
        }
        grouped.entry(vehicle_id).or_default().push(contribution);
    }

    struct Ranked {
        candidate: FinalCandidate,
        rank_key: f64,
    }

    let mut ranked: Vec<Ranked> = order
        .into_iter()
        .map(|vehicle_id| {
            let contributions = grouped.remove(&vehicle_id).expect("grouped by this id");
            let weight_sum: f64 = contributions.iter().map(|c| c.weight).sum();
            let weight_mean = weight_sum / contributions.len() as f64;
            let score_weighted_sum: f64 = contributions.iter().map(|c| c.score * c.weight).sum();
            let score = if weight_sum > 0.0 {
                score_weighted_sum / weight_sum
            } else {
                contributions.iter().map(|c| c.score).sum::<f64>() / contributions.len() as f64
            };
            let score = reco_types::clamp01(score);

            let mut per_source_scores = BTreeMap::new();
            let mut contributing_sources = Vec::new();
            for c in &contributions {
                per_source_scores.insert(c.source.clone(), c.score);
                contributing_sources.push(c.source.clone());
            }

            Ranked {
                candidate: FinalCandidate {
                    vehicle_id,
                    final_score: score,
                    contributing_sources,
                    per_source_scores,
                },
                rank_key: weight_mean * score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.rank_key
            .partial_cmp(&a.rank_key)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.candidate
                    .contributing_sources
                    .len()
                    .cmp(&a.candidate.contributing_sources.len())
            })
            .then_with(|| a.candidate.vehicle_id.cmp(&b.candidate.vehicle_id))
    });

    let candidates = ranked
        .into_iter()
        .take(config.fusion_top_k)
        .map(|r| r.candidate)
        .collect();

    FusedResult {
        candidates,
        fusion_method: "weighted_mean_v1".to_string(),
        per_source_contribution,
        predictor_contribution,
    }
}

fn collect(out: &mut Vec<(String, Contribution)>, source: &str, candidates: &[Candidate], confidence: f64, take: usize) {
    for candidate in candidates.iter().take(take) {
        out.push((
            candidate.vehicle_id.clone(),
            Contribution {
                source: source.to_string(),
                score: reco_types::clamp01(candidate.score),
                weight: reco_types::clamp01(confidence),
            },
        ));
    }
}
