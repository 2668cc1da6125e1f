use async_trait::async_trait;
use reco_types::{Candidate, Purpose, UserProfile};

use crate::analyzer::{Analyzer, AnalyzerContext, AnalyzerError, AnalyzerOutput};

use super::fixtures::catalog;

/// A stand-in for the neural collaborative-filtering model: ranks by a
/// static popularity score, nudged by purpose, and reports a confidence
/// that scales with how many vehicles it had an opinion on.
pub struct CollaborativePredictor;

#[async_trait]
impl Analyzer for CollaborativePredictor {
    fn id(&self) -> &str {
        "predictor"
    }

    fn display_name(&self) -> &str {
        "Collaborative Filtering Predictor"
    }

    async fn analyze(&self, profile: &UserProfile, _ctx: &AnalyzerContext) -> Result<AnalyzerOutput, AnalyzerError> {
        let mut candidates: Vec<Candidate> = catalog()
            .iter()
            .filter(|v| v.price <= profile.budget.max)
            .map(|v| {
                let mut score = v.popularity;
                if profile.purpose == Purpose::Family && matches!(v.transmission, "automatic") {
                    score += 0.05;
                }
                Candidate::new(v.id, score)
            })
            .collect();

        if candidates.is_empty() {
            return Err(AnalyzerError("no vehicles for the predictor to rank".to_string()));
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let confidence = (candidates.len() as f64 / catalog().len() as f64).clamp(0.0, 1.0) * 0.9 + 0.1;
        Ok(AnalyzerOutput { candidates, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reco_types::{Budget, Preferences};
    use serde_json::Map;

    #[tokio::test]
    async fn confidence_scales_with_catalog_coverage() {
        let wide = UserProfile {
            budget: Budget { min: 0.0, max: 100_000.0 },
            preferences: Preferences::default(),
            purpose: Purpose::General,
            extra: Map::new(),
        };
        let narrow = UserProfile {
            budget: Budget { min: 0.0, max: 12000.0 },
            preferences: Preferences::default(),
            purpose: Purpose::General,
            extra: Map::new(),
        };
        let ctx = AnalyzerContext { session_id: "s1".into() };
        let wide_output = CollaborativePredictor.analyze(&wide, &ctx).await.unwrap();
        let narrow_output = CollaborativePredictor.analyze(&narrow, &ctx).await.unwrap();
        assert!(wide_output.confidence >= narrow_output.confidence);
    }
}
