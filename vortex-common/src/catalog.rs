//! Metric catalog
//!
//! The static 29-metric table used by every scoring operation: four
//! categories, each with a category weight and a fixed set of weighted,
//! described sub-metrics. Category weights sum to 1.0, as do the metric
//! weights inside each category; [`validate_weights`] reports any drift.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Tolerance used when checking that a weight table sums to 1.0
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Scoring category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Creator,
    Collector,
    Marketplace,
    Community,
}

/// One weighted sub-metric of a category
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDefinition {
    /// Metric key as stored in `user_metrics.metric_key`
    pub key: &'static str,
    /// Weight inside the category
    pub weight: f64,
    /// Expected weekly minimum, informational only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_minimum: Option<f64>,
    pub description: &'static str,
}

const fn metric(key: &'static str, weight: f64, description: &'static str) -> MetricDefinition {
    MetricDefinition {
        key,
        weight,
        target_minimum: None,
        description,
    }
}

const CREATOR_METRICS: &[MetricDefinition] = &[
    MetricDefinition {
        key: "weekly_artwork_uploads",
        weight: 0.15,
        target_minimum: Some(2.0),
        description: "Minimum 2 handmade + Seed Art uploads per week",
    },
    metric(
        "originality_score",
        0.20,
        "Style deviation, pattern signature, and AI originality scan",
    ),
    metric(
        "artistic_growth_index",
        0.15,
        "Tracks complexity, evolution, and feedback over time",
    ),
    metric("peer_reviews", 0.10, "Ratings by verified artists or curators"),
    metric("narrative_quality", 0.10, "Caption/story uploads + community upvotes"),
    metric("visibility_impact", 0.10, "Unique collector views/saves"),
    metric(
        "intellectual_dna_recognition",
        0.10,
        "How often user's style inspires other artworks",
    ),
    metric(
        "collection_completion_rate",
        0.10,
        "Percentage of completed and published collections",
    ),
];

const COLLECTOR_METRICS: &[MetricDefinition] = &[
    metric(
        "collection_diversity_score",
        0.15,
        "Variety of artists, styles, and timeframes in wallet",
    ),
    metric("active_swaps", 0.15, "Number of swaps or exchanges via TOLA"),
    metric("curation_votes", 0.10, "Participation in DAO or community-led curation"),
    metric("purchase_frequency", 0.15, "Frequency and consistency of purchases"),
    metric(
        "insight_contributions",
        0.10,
        "Reviews, referrals, or analytical comments on works",
    ),
    metric("early_access_usage", 0.10, "Usage of reserved or early access options"),
    metric(
        "reinjection_of_art",
        0.10,
        "Artworks returned to circulation (resale, etc.)",
    ),
    metric("support_continuity_score", 0.15, "Ongoing support of artists over time"),
];

const MARKETPLACE_METRICS: &[MetricDefinition] = &[
    metric("trading_volume_tola", 0.20, "Total value of transactions using TOLA"),
    metric("liquidity_support", 0.15, "Listings available for swaps or secondary sale"),
    metric(
        "system_navigation_score",
        0.10,
        "Breadth of user engagement across platform features",
    ),
    metric("feature_adoption", 0.15, "Trying new features, attending tutorials, etc."),
    metric(
        "smart_contract_use_score",
        0.15,
        "Usage of royalty and vault smart contracts",
    ),
    metric(
        "community_forum_participation",
        0.15,
        "Posts, replies, or moderation activities",
    ),
    metric("ambassador_actions", 0.10, "Efforts made to onboard or teach others"),
];

const COMMUNITY_METRICS: &[MetricDefinition] = &[
    metric("mentorship_score", 0.20, "Hours/sessions helping new users"),
    metric("events_hosted_participated", 0.15, "Participation in events and talks"),
    metric("dao_proposal_engagement", 0.15, "Creating or voting on proposals"),
    metric("tola_redistribution_index", 0.20, "TOLA tokens shared or gifted"),
    metric(
        "knowledge_base_contributions",
        0.15,
        "Creating tutorials, guides, or documentation",
    ),
    metric("trustworthiness_rating", 0.15, "Positive reviews and reliable actions"),
];

impl MetricCategory {
    /// All categories in canonical order
    pub const ALL: [MetricCategory; 4] = [
        MetricCategory::Creator,
        MetricCategory::Collector,
        MetricCategory::Marketplace,
        MetricCategory::Community,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Creator => "creator",
            MetricCategory::Collector => "collector",
            MetricCategory::Marketplace => "marketplace",
            MetricCategory::Community => "community",
        }
    }

    /// Category weight used for the composite score
    pub fn weight(&self) -> f64 {
        match self {
            MetricCategory::Creator => 0.30,
            MetricCategory::Collector => 0.25,
            MetricCategory::Marketplace => 0.25,
            MetricCategory::Community => 0.20,
        }
    }

    /// Configured sub-metrics, in catalog order
    pub fn metrics(&self) -> &'static [MetricDefinition] {
        match self {
            MetricCategory::Creator => CREATOR_METRICS,
            MetricCategory::Collector => COLLECTOR_METRICS,
            MetricCategory::Marketplace => MARKETPLACE_METRICS,
            MetricCategory::Community => COMMUNITY_METRICS,
        }
    }

    /// Look up a metric of this category by key
    pub fn metric(&self, key: &str) -> Option<&'static MetricDefinition> {
        self.metrics().iter().find(|m| m.key == key)
    }

    /// Action type recorded in the behavior log for observations of this category
    pub fn action_type(&self) -> &'static str {
        match self {
            MetricCategory::Creator => "creator_action",
            MetricCategory::Collector => "collector_action",
            MetricCategory::Marketplace => "marketplace_action",
            MetricCategory::Community => "community_action",
        }
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creator" => Ok(MetricCategory::Creator),
            "collector" => Ok(MetricCategory::Collector),
            "marketplace" => Ok(MetricCategory::Marketplace),
            "community" => Ok(MetricCategory::Community),
            other => Err(Error::InvalidInput(format!("Unknown metric category: {}", other))),
        }
    }
}

/// Resolve a (category, metric key) pair against the catalog
pub fn lookup(category: &str, metric_key: &str) -> Option<(MetricCategory, &'static MetricDefinition)> {
    let category = category.parse::<MetricCategory>().ok()?;
    category.metric(metric_key).map(|m| (category, m))
}

/// Total number of metrics across all categories
pub fn total_metric_count() -> usize {
    MetricCategory::ALL.iter().map(|c| c.metrics().len()).sum()
}

/// A weight table whose entries do not sum to 1.0
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightDeviation {
    /// `"categories"` for the category table, otherwise the category name
    pub scope: String,
    pub sum: f64,
}

/// Check category weights and per-category metric weights
///
/// Returns every table that is off by more than [`WEIGHT_TOLERANCE`].
pub fn validate_weights() -> Vec<WeightDeviation> {
    let mut deviations = Vec::new();

    let category_sum: f64 = MetricCategory::ALL.iter().map(|c| c.weight()).sum();
    if (category_sum - 1.0).abs() > WEIGHT_TOLERANCE {
        deviations.push(WeightDeviation {
            scope: "categories".to_string(),
            sum: category_sum,
        });
    }

    for category in MetricCategory::ALL {
        let sum: f64 = category.metrics().iter().map(|m| m.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            deviations.push(WeightDeviation {
                scope: category.as_str().to_string(),
                sum,
            });
        }
    }

    deviations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_has_29_metrics() {
        assert_eq!(total_metric_count(), 29);
        assert_eq!(MetricCategory::Creator.metrics().len(), 8);
        assert_eq!(MetricCategory::Collector.metrics().len(), 8);
        assert_eq!(MetricCategory::Marketplace.metrics().len(), 7);
        assert_eq!(MetricCategory::Community.metrics().len(), 6);
    }

    #[test]
    fn test_weight_tables_sum_to_one() {
        assert!(validate_weights().is_empty(), "{:?}", validate_weights());
    }

    #[test]
    fn test_metric_keys_unique_within_category() {
        for category in MetricCategory::ALL {
            let keys: HashSet<_> = category.metrics().iter().map(|m| m.key).collect();
            assert_eq!(keys.len(), category.metrics().len(), "duplicate key in {}", category);
        }
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for category in MetricCategory::ALL {
            assert_eq!(category.as_str().parse::<MetricCategory>().unwrap(), category);
        }
        assert!("Creator".parse::<MetricCategory>().is_err());
        assert!("curator".parse::<MetricCategory>().is_err());
    }

    #[test]
    fn test_lookup() {
        let (category, def) = lookup("marketplace", "trading_volume_tola").unwrap();
        assert_eq!(category, MetricCategory::Marketplace);
        assert_eq!(def.weight, 0.20);

        // Known key, wrong category
        assert!(lookup("creator", "trading_volume_tola").is_none());
        assert!(lookup("unknown", "trading_volume_tola").is_none());
    }

    #[test]
    fn test_weekly_uploads_carries_target_minimum() {
        let def = MetricCategory::Creator.metric("weekly_artwork_uploads").unwrap();
        assert_eq!(def.target_minimum, Some(2.0));
        assert!(MetricCategory::Creator
            .metric("originality_score")
            .unwrap()
            .target_minimum
            .is_none());
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&MetricCategory::Marketplace).unwrap();
        assert_eq!(json, "\"marketplace\"");
    }
}
