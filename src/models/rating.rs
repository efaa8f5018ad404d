use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    #[serde(rename = "user")]
    pub user_id: i64,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
}

/// Aggregates of an article right after a rating was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub article_id: i64,
    pub num_reviews: i64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingOutcome {
    Recorded(RatingSummary),
    AlreadyRated,
    ArticleNotFound,
}

/// Another user who liked some of the same articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub user_id: i64,
    pub shared_likes: i64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateRequest {
    pub rating: f64,
}
