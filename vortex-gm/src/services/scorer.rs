//! Category and composite score calculation
//!
//! Pure functions over metric values; no database access.
//!
//! **Category score:** for every configured metric of the category (metrics
//! with no stored value count as 0), clamp the value to [0, 100], multiply by
//! the metric weight and sum. The sum is then divided by the normalizer:
//! - [`Normalization::MetricCount`] (default): the number of configured metrics
//! - [`Normalization::WeightSum`]: the sum of the configured metric weights
//!
//! With count normalization the weighting is partially cancelled and a skewed
//! weight table can push a score above 100; weight-sum normalization keeps
//! scores inside [0, 100].
//!
//! **Composite score:** Σ category score × category weight.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use vortex_common::{Error, MetricCategory};

/// Upper bound applied to metric values before weighting
pub const METRIC_VALUE_CAP: f64 = 100.0;

/// Category scores below this produce an improvement recommendation
pub const RECOMMENDATION_THRESHOLD: f64 = 50.0;

/// Category score per category
pub type CategoryScores = BTreeMap<MetricCategory, f64>;

/// Divisor used when averaging weighted metric values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Divide by the number of configured metrics
    #[default]
    MetricCount,
    /// Divide by the sum of configured metric weights
    WeightSum,
}

impl Normalization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Normalization::MetricCount => "metric_count",
            Normalization::WeightSum => "weight_sum",
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Normalization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metric_count" => Ok(Normalization::MetricCount),
            "weight_sum" => Ok(Normalization::WeightSum),
            other => Err(Error::Config(format!("Invalid scoring normalization: {}", other))),
        }
    }
}

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Clamp a stored metric value into the scoring range
pub fn clamp_metric_value(value: f64) -> f64 {
    value.clamp(0.0, METRIC_VALUE_CAP)
}

/// Score one category
///
/// `value_of` returns the accumulated value of a metric key (0 when unset).
pub fn category_score<F>(category: MetricCategory, value_of: F, normalization: Normalization) -> f64
where
    F: Fn(&str) -> f64,
{
    let metrics = category.metrics();

    let mut total_score = 0.0;
    let mut total_weight = 0.0;
    for metric in metrics {
        total_score += clamp_metric_value(value_of(metric.key)) * metric.weight;
        total_weight += metric.weight;
    }

    let divisor = match normalization {
        Normalization::MetricCount => metrics.len() as f64,
        Normalization::WeightSum => total_weight,
    };

    if divisor > 0.0 {
        round2(total_score / divisor)
    } else {
        0.0
    }
}

/// Score every category
pub fn score_all<F>(value_of: F, normalization: Normalization) -> CategoryScores
where
    F: Fn(MetricCategory, &str) -> f64,
{
    MetricCategory::ALL
        .iter()
        .map(|&category| {
            let score = category_score(category, |key| value_of(category, key), normalization);
            (category, score)
        })
        .collect()
}

/// Weighted sum of category scores
///
/// Categories missing from `scores` contribute nothing.
pub fn composite_score(scores: &CategoryScores) -> f64 {
    let total: f64 = MetricCategory::ALL
        .iter()
        .filter_map(|category| scores.get(category).map(|s| s * category.weight()))
        .sum();
    round2(total)
}

/// Category-weight-weighted mean of the category scores
pub fn engagement_level(scores: &CategoryScores) -> f64 {
    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for (category, score) in scores {
        total += score * category.weight();
        weight_sum += category.weight();
    }

    if weight_sum > 0.0 {
        round2(total / weight_sum)
    } else {
        0.0
    }
}

/// Category with the highest weighted score
///
/// Ties resolve to the earlier category in catalog order.
pub fn primary_driver(scores: &CategoryScores) -> MetricCategory {
    let mut best = MetricCategory::ALL[0];
    let mut best_score = f64::NEG_INFINITY;
    for category in MetricCategory::ALL {
        let weighted = scores.get(&category).copied().unwrap_or(0.0) * category.weight();
        if weighted > best_score {
            best = category;
            best_score = weighted;
        }
    }
    best
}

/// Improvement hint for a category scoring below the threshold
pub fn category_recommendation(category: MetricCategory, score: f64) -> String {
    match category {
        MetricCategory::Creator => format!(
            "Focus on improving your artwork uploads and originality scores. Current score: {}%",
            score
        ),
        MetricCategory::Collector => format!(
            "Diversify your collection and increase your marketplace activity. Current score: {}%",
            score
        ),
        MetricCategory::Marketplace => format!(
            "Engage more with trading and platform features. Current score: {}%",
            score
        ),
        MetricCategory::Community => format!(
            "Participate in mentorship and DAO activities. Current score: {}%",
            score
        ),
    }
}

/// Recommendations for every category below [`RECOMMENDATION_THRESHOLD`]
pub fn improvement_recommendations(scores: &CategoryScores) -> Vec<String> {
    MetricCategory::ALL
        .iter()
        .filter_map(|category| {
            let score = *scores.get(category)?;
            (score < RECOMMENDATION_THRESHOLD).then(|| category_recommendation(*category, score))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn values(pairs: &[(&'static str, f64)]) -> HashMap<&'static str, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_count_normalization_matches_hand_computation() {
        let v = values(&[
            ("weekly_artwork_uploads", 10.0),
            ("originality_score", 150.0), // clamped to 100
            ("peer_reviews", -5.0),       // clamped to 0
        ]);

        // (10 × 0.15 + 100 × 0.20 + 0 × 0.10) / 8 metrics = 21.5 / 8 = 2.6875
        let score = category_score(
            MetricCategory::Creator,
            |k| v.get(k).copied().unwrap_or(0.0),
            Normalization::MetricCount,
        );
        assert!((score - 2.69).abs() < 1e-9, "score = {}", score);
    }

    #[test]
    fn test_weight_sum_normalization() {
        let v = values(&[("weekly_artwork_uploads", 10.0), ("originality_score", 150.0)]);

        // Creator weights sum to 1.0, so the weighted sum is the score
        let score = category_score(
            MetricCategory::Creator,
            |k| v.get(k).copied().unwrap_or(0.0),
            Normalization::WeightSum,
        );
        assert!((score - 21.5).abs() < 1e-9, "score = {}", score);
    }

    #[test]
    fn test_all_metrics_maxed() {
        // Every metric at 100: weight-sum gives 100, count gives 100 / metric count
        let max = |_: &str| 1000.0;
        assert!((category_score(MetricCategory::Community, max, Normalization::WeightSum) - 100.0).abs() < 1e-9);
        assert!(
            (category_score(MetricCategory::Community, max, Normalization::MetricCount) - round2(100.0 / 6.0)).abs()
                < 1e-9
        );
    }

    #[test]
    fn test_empty_metrics_score_zero() {
        let scores = score_all(|_, _| 0.0, Normalization::MetricCount);
        assert_eq!(scores.len(), 4);
        assert!(scores.values().all(|s| *s == 0.0));
        assert_eq!(composite_score(&scores), 0.0);
    }

    #[test]
    fn test_composite_is_weighted_sum() {
        let mut scores = CategoryScores::new();
        scores.insert(MetricCategory::Creator, 40.0);
        scores.insert(MetricCategory::Collector, 20.0);
        scores.insert(MetricCategory::Marketplace, 10.0);
        scores.insert(MetricCategory::Community, 50.0);

        // 40×0.30 + 20×0.25 + 10×0.25 + 50×0.20 = 12 + 5 + 2.5 + 10
        assert!((composite_score(&scores) - 29.5).abs() < 1e-9);
    }

    #[test]
    fn test_composite_ignores_missing_categories() {
        let mut scores = CategoryScores::new();
        scores.insert(MetricCategory::Community, 50.0);
        assert!((composite_score(&scores) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_engagement_level_is_weighted_mean() {
        let mut scores = CategoryScores::new();
        scores.insert(MetricCategory::Creator, 60.0);
        scores.insert(MetricCategory::Community, 10.0);

        // (60×0.30 + 10×0.20) / 0.50 = 40
        assert!((engagement_level(&scores) - 40.0).abs() < 1e-9);
        assert_eq!(engagement_level(&CategoryScores::new()), 0.0);
    }

    #[test]
    fn test_primary_driver() {
        let mut scores = CategoryScores::new();
        scores.insert(MetricCategory::Creator, 10.0); // 3.0 weighted
        scores.insert(MetricCategory::Community, 20.0); // 4.0 weighted
        assert_eq!(primary_driver(&scores), MetricCategory::Community);

        // All zero: first category wins
        assert_eq!(primary_driver(&CategoryScores::new()), MetricCategory::Creator);
    }

    #[test]
    fn test_recommendations_only_below_threshold() {
        let mut scores = CategoryScores::new();
        scores.insert(MetricCategory::Creator, 75.0);
        scores.insert(MetricCategory::Collector, 49.99);
        scores.insert(MetricCategory::Marketplace, 50.0);

        let recs = improvement_recommendations(&scores);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].starts_with("Diversify your collection"));
        assert!(recs[0].ends_with("49.99%"));
    }

    #[test]
    fn test_normalization_parsing() {
        assert_eq!("metric_count".parse::<Normalization>().unwrap(), Normalization::MetricCount);
        assert_eq!("weight_sum".parse::<Normalization>().unwrap(), Normalization::WeightSum);
        assert!("average".parse::<Normalization>().is_err());
        assert_eq!(Normalization::default(), Normalization::MetricCount);
    }
}
