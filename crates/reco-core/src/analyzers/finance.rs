use async_trait::async_trait;
use reco_types::{Candidate, Purpose, UserProfile};

use crate::analyzer::{Analyzer, AnalyzerContext, AnalyzerError, AnalyzerOutput};

use super::fixtures::catalog;

/// Scores the catalog by affordability relative to the requested budget,
/// with a mild business-purpose bias toward newer, lower-mileage vehicles.
pub struct FinanceAnalyzer;

#[async_trait]
impl Analyzer for FinanceAnalyzer {
    fn id(&self) -> &str {
        "finance"
    }

    fn display_name(&self) -> &str {
        "Finance Advisor"
    }

    async fn analyze(&self, profile: &UserProfile, _ctx: &AnalyzerContext) -> Result<AnalyzerOutput, AnalyzerError> {
        let span = (profile.budget.max - profile.budget.min).max(1.0);
        let mut candidates: Vec<Candidate> = catalog()
            .iter()
            .filter(|v| v.price <= profile.budget.max)
            .map(|v| {
                let headroom = (profile.budget.max - v.price).max(0.0) / span;
                let mut score = 0.4 + headroom * 0.5;
                if profile.purpose == Purpose::Business && v.year >= 2020 {
                    score += 0.1;
                }
                Candidate::new(v.id, score)
            })
            .collect();

        if candidates.is_empty() {
            return Err(AnalyzerError("no vehicles affordable".to_string()));
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(AnalyzerOutput {
            candidates,
            confidence: 0.7,
        })
    }
}
