use std::sync::Arc;

use crate::config::RatingConfig;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{RatingOutcome, RatingSummary};

pub struct RatingAggregator {
    repository: Arc<Repository>,
    config: RatingConfig,
}

impl RatingAggregator {
    pub fn new(repository: Arc<Repository>, config: RatingConfig) -> Self {
        Self { repository, config }
    }

    /// Records `user_id`'s rating of an article and returns the article's
    /// recomputed review count and mean.
    pub async fn submit_rating(&self, article_id: i64, user_id: i64, value: f64) -> Result<RatingSummary> {
        self.check_bounds(value)?;

        match self.repository.insert_rating(article_id, user_id, value).await? {
            RatingOutcome::Recorded(summary) => {
                tracing::info!(
                    article_id,
                    user_id,
                    num_reviews = summary.num_reviews,
                    average_rating = summary.average_rating,
                    "Rating recorded"
                );
                Ok(summary)
            }
            RatingOutcome::AlreadyRated => Err(AppError::Conflict(
                "You have already rated this article.".to_string(),
            )),
            RatingOutcome::ArticleNotFound => {
                Err(AppError::NotFound("News article not found".to_string()))
            }
        }
    }

    fn check_bounds(&self, value: f64) -> Result<()> {
        let RatingConfig { min_rating, max_rating } = self.config;
        if !value.is_finite() || value < min_rating || value > max_rating {
            return Err(AppError::InvalidInput(format!(
                "Rating must be between {min_rating} and {max_rating}"
            )));
        }
        Ok(())
    }
}
