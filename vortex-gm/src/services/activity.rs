//! Platform activity events
//!
//! Translates domain events (uploads, purchases, votes...) into the metric
//! observations they imply. Each observation carries the event identifiers
//! as context.

use serde::{Deserialize, Serialize};
use serde_json::json;
use vortex_common::MetricCategory;

use crate::services::accumulator::MetricObservation;

/// A platform event attributed to one user (the actor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ActivityEvent {
    ArtworkUploaded {
        artwork_id: i64,
        /// Originality rating from an external analysis, when available
        #[serde(default)]
        originality: Option<f64>,
    },
    CollectionCreated {
        collection_id: i64,
    },
    PurchaseCompleted {
        purchase_id: i64,
        artwork_id: i64,
        /// Purchase value in TOLA
        #[serde(default)]
        value: f64,
    },
    SwapCompleted {
        artwork_id: i64,
        #[serde(default)]
        value: f64,
    },
    DaoVoteCast {
        proposal_id: i64,
        vote: String,
    },
    /// Attributed to the sender
    TolaTransferred {
        recipient: i64,
        amount: f64,
    },
    ForumPostCreated {
        post_id: i64,
    },
    /// Attributed to the mentor
    MentorshipSession {
        mentee_id: i64,
        /// Session length, counted directly into the mentorship score
        duration: f64,
    },
}

impl ActivityEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ActivityEvent::ArtworkUploaded { .. } => "artwork_uploaded",
            ActivityEvent::CollectionCreated { .. } => "collection_created",
            ActivityEvent::PurchaseCompleted { .. } => "purchase_completed",
            ActivityEvent::SwapCompleted { .. } => "swap_completed",
            ActivityEvent::DaoVoteCast { .. } => "dao_vote_cast",
            ActivityEvent::TolaTransferred { .. } => "tola_transferred",
            ActivityEvent::ForumPostCreated { .. } => "forum_post_created",
            ActivityEvent::MentorshipSession { .. } => "mentorship_session",
        }
    }

    /// Observations implied by this event, in recording order
    pub fn observations(&self, user_id: i64) -> Vec<MetricObservation> {
        use MetricCategory::*;

        let obs = |category, key: &str, value: f64, context: serde_json::Value| {
            MetricObservation::new(user_id, category, key, value).with_context(context)
        };

        match self {
            ActivityEvent::ArtworkUploaded { artwork_id, originality } => {
                let context = json!({ "artwork_id": artwork_id });
                let mut list = vec![obs(Creator, "weekly_artwork_uploads", 1.0, context.clone())];
                if let Some(originality) = originality {
                    list.push(obs(Creator, "originality_score", *originality, context));
                }
                list
            }
            ActivityEvent::CollectionCreated { collection_id } => vec![obs(
                Creator,
                "collection_completion_rate",
                1.0,
                json!({ "collection_id": collection_id }),
            )],
            ActivityEvent::PurchaseCompleted {
                purchase_id,
                artwork_id,
                value,
            } => {
                let context = json!({ "purchase_id": purchase_id, "artwork_id": artwork_id });
                vec![
                    obs(Collector, "purchase_frequency", 1.0, context.clone()),
                    obs(Marketplace, "trading_volume_tola", *value, context),
                ]
            }
            ActivityEvent::SwapCompleted { artwork_id, value } => {
                let context = json!({ "action": "swap_completed", "artwork_id": artwork_id });
                vec![
                    obs(Collector, "active_swaps", 1.0, context.clone()),
                    obs(Marketplace, "trading_volume_tola", *value, context),
                ]
            }
            ActivityEvent::DaoVoteCast { proposal_id, vote } => vec![obs(
                Community,
                "dao_proposal_engagement",
                1.0,
                json!({ "proposal_id": proposal_id, "vote": vote }),
            )],
            ActivityEvent::TolaTransferred { recipient, amount } => vec![obs(
                Community,
                "tola_redistribution_index",
                *amount,
                json!({ "recipient": recipient }),
            )],
            ActivityEvent::ForumPostCreated { post_id } => vec![obs(
                Marketplace,
                "community_forum_participation",
                1.0,
                json!({ "post_id": post_id }),
            )],
            ActivityEvent::MentorshipSession { mentee_id, duration } => vec![obs(
                Community,
                "mentorship_score",
                *duration,
                json!({ "mentee_id": mentee_id }),
            )],
        }
    }
}
