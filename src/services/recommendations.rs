//! Two-hop "users who liked what you liked" recommendations.
//!
//! 1. Collect the articles the user liked (rated at or above the threshold).
//! 2. Find other users who liked any of them, ranked by how many likes they
//!    share with the user.
//! 3. Suggest what those neighbors liked that the user has not rated yet,
//!    best average rating first.
//!
//! Without a liked set or without neighbors the engine falls back to the
//! globally top-rated articles.

use std::sync::Arc;

use crate::config::RecommendationConfig;
use crate::db::Repository;
use crate::error::Result;
use crate::models::Article;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationSource {
    Personalized,
    Popular,
}

#[derive(Debug, Clone)]
pub struct Recommendations {
    pub source: RecommendationSource,
    pub articles: Vec<Article>,
}

pub struct RecommendationEngine {
    repository: Arc<Repository>,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(repository: Arc<Repository>, config: RecommendationConfig) -> Self {
        Self { repository, config }
    }

    pub async fn recommend(&self, user_id: i64) -> Result<Recommendations> {
        let RecommendationConfig {
            like_threshold,
            neighbor_limit,
            result_limit,
        } = self.config;

        let liked = self
            .repository
            .liked_article_ids(user_id, like_threshold)
            .await?;
        if liked.is_empty() {
            tracing::debug!(user_id, "No liked articles, using popular fallback");
            return self.popular().await;
        }

        let neighbors = self
            .repository
            .similar_users(user_id, liked, like_threshold, neighbor_limit)
            .await?;
        if neighbors.is_empty() {
            tracing::debug!(user_id, "No neighbors, using popular fallback");
            return self.popular().await;
        }

        let neighbor_ids = neighbors.iter().map(|n| n.user_id).collect();
        let articles = self
            .repository
            .articles_liked_by(neighbor_ids, user_id, like_threshold, result_limit)
            .await?;

        tracing::debug!(
            user_id,
            neighbors = neighbors.len(),
            results = articles.len(),
            "Personalized recommendations"
        );
        Ok(Recommendations {
            source: RecommendationSource::Personalized,
            articles,
        })
    }

    async fn popular(&self) -> Result<Recommendations> {
        let articles = self
            .repository
            .top_rated_articles(self.config.result_limit)
            .await?;
        Ok(Recommendations {
            source: RecommendationSource::Popular,
            articles,
        })
    }
}
