use async_trait::async_trait;
use reco_types::{Candidate, UserProfile};

use crate::analyzer::{Analyzer, AnalyzerContext, AnalyzerError, AnalyzerOutput};

use super::fixtures::catalog;

/// A stand-in for sentiment analysis over owner reviews: ranks strictly by
/// the fixture catalog's static rating.
pub struct ReviewAnalyzer;

#[async_trait]
impl Analyzer for ReviewAnalyzer {
    fn id(&self) -> &str {
        "review"
    }

    fn display_name(&self) -> &str {
        "Review Sentiment"
    }

    async fn analyze(&self, profile: &UserProfile, _ctx: &AnalyzerContext) -> Result<AnalyzerOutput, AnalyzerError> {
        let mut candidates: Vec<Candidate> = catalog()
            .iter()
            .filter(|v| v.price <= profile.budget.max)
            .map(|v| Candidate::new(v.id, v.rating).with_reason("owner review sentiment"))
            .collect();

        if candidates.is_empty() {
            return Err(AnalyzerError("no reviewed vehicles within budget".to_string()));
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(AnalyzerOutput {
            candidates,
            confidence: 0.65,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reco_types::{Budget, Preferences, Purpose};
    use serde_json::Map;

    #[tokio::test]
    async fn ranks_by_static_rating_descending() {
        let profile = UserProfile {
            budget: Budget { min: 0.0, max: 100_000.0 },
            preferences: Preferences::default(),
            purpose: Purpose::General,
            extra: Map::new(),
        };
        let ctx = AnalyzerContext { session_id: "s1".into() };
        let output = ReviewAnalyzer.analyze(&profile, &ctx).await.unwrap();
        let scores: Vec<f64> = output.candidates.iter().map(|c| c.score).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(scores, sorted);
    }
}
