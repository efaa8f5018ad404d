use std::sync::Arc;

use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::services::{
    AuthService, LogMailer, Mailer, NewsService, Notifier, RatingAggregator,
    RecommendationEngine, SmtpMailer,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<AuthService>,
    pub news: Arc<NewsService>,
    pub ratings: Arc<RatingAggregator>,
    pub recommendations: Arc<RecommendationEngine>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => {
                tracing::info!("Sending email through {}:{}", smtp.host, smtp.port);
                Arc::new(SmtpMailer::new(smtp)?)
            }
            None => {
                tracing::warn!("No [smtp] section configured, emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        Ok(Self::from_parts(config, Arc::new(repository), mailer))
    }

    pub fn from_parts(config: Config, repository: Arc<Repository>, mailer: Arc<dyn Mailer>) -> Self {
        let notifier = Notifier::new(mailer, &config.frontend_url, &config.site_name);

        Self {
            auth: Arc::new(AuthService::new(
                Arc::clone(&repository),
                notifier.clone(),
                &config,
            )),
            news: Arc::new(NewsService::new(Arc::clone(&repository), notifier)),
            ratings: Arc::new(RatingAggregator::new(
                Arc::clone(&repository),
                config.ratings,
            )),
            recommendations: Arc::new(RecommendationEngine::new(
                repository,
                config.recommendations,
            )),
            config: Arc::new(config),
        }
    }
}
