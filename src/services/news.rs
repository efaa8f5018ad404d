use std::sync::Arc;

use tokio::task::JoinHandle;
use validator::Validate;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Article, ArticleFilter, ArticleUpdate, NewArticle};

use super::notifier::{DispatchReport, Notifier};

pub struct Published {
    pub article: Article,
    pub announcement: JoinHandle<DispatchReport>,
}

pub struct NewsService {
    repository: Arc<Repository>,
    notifier: Notifier,
}

fn not_found() -> AppError {
    AppError::NotFound("News item not found".to_string())
}

impl NewsService {
    pub fn new(repository: Arc<Repository>, notifier: Notifier) -> Self {
        Self { repository, notifier }
    }

    pub async fn list(&self, filter: ArticleFilter) -> Result<Vec<Article>> {
        self.repository.list_articles(filter.category).await
    }

    pub async fn get(&self, id: i64) -> Result<Article> {
        self.repository.get_article(id).await?.ok_or_else(not_found)
    }

    /// Stores the article, then announces it to every verified user in
    /// the background. Delivery problems never fail the creation.
    pub async fn create(&self, input: NewArticle) -> Result<Published> {
        input.validate()?;

        let article = self.repository.insert_article(input).await?;
        tracing::info!(article_id = article.id, category = %article.category, "Article created");

        let repository = Arc::clone(&self.repository);
        let notifier = self.notifier.clone();
        let announced = article.clone();
        let announcement = self.notifier.dispatch_with(
            async move { repository.verified_user_emails().await },
            move |to| notifier.article_email(to, &announced),
        );

        Ok(Published {
            article,
            announcement,
        })
    }

    pub async fn update(&self, id: i64, update: ArticleUpdate) -> Result<Article> {
        update.validate()?;

        let article = self
            .repository
            .update_article(id, update)
            .await?
            .ok_or_else(not_found)?;
        tracing::info!(article_id = id, "Article updated");
        Ok(article)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.repository.delete_article(id).await? {
            return Err(not_found());
        }
        tracing::info!(article_id = id, "Article deleted");
        Ok(())
    }
}
