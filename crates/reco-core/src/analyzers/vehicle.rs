use async_trait::async_trait;
use reco_types::{Candidate, UserProfile};

use crate::analyzer::{Analyzer, AnalyzerContext, AnalyzerError, AnalyzerOutput};

use super::fixtures::catalog;

/// Scores the catalog against brand, model year, and mileage preferences.
pub struct VehicleAnalyzer;

#[async_trait]
impl Analyzer for VehicleAnalyzer {
    fn id(&self) -> &str {
        "vehicle"
    }

    fn display_name(&self) -> &str {
        "Vehicle Matcher"
    }

    async fn analyze(&self, profile: &UserProfile, _ctx: &AnalyzerContext) -> Result<AnalyzerOutput, AnalyzerError> {
        let mut candidates: Vec<Candidate> = catalog()
            .iter()
            .filter(|v| profile.budget.min <= v.price && v.price <= profile.budget.max)
            .map(|v| {
                let mut score = 0.5;
                if profile.preferences.brands.is_empty() || profile.preferences.brands.iter().any(|b| b.eq_ignore_ascii_case(v.brand)) {
                    score += 0.25;
                }
                if let Some(min_year) = profile.preferences.min_year {
                    if v.year >= min_year {
                        score += 0.15;
                    } else {
                        score -= 0.2;
                    }
                }
                if let Some(max_distance) = profile.preferences.max_distance {
                    if v.mileage <= max_distance {
                        score += 0.1;
                    } else {
                        score -= 0.15;
                    }
                }
                Candidate::new(v.id, score)
            })
            .collect();

        if candidates.is_empty() {
            return Err(AnalyzerError("no vehicles within budget".to_string()));
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(AnalyzerOutput {
            candidates,
            confidence: 0.8,
        })
    }
}
