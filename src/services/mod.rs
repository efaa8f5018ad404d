pub mod auth;
pub mod news;
pub mod notifier;
pub mod ratings;
pub mod recommendations;

pub use auth::AuthService;
pub use news::NewsService;
pub use notifier::{Email, LogMailer, Mailer, MemoryMailer, Notifier, SmtpMailer};
pub use ratings::RatingAggregator;
pub use recommendations::{RecommendationEngine, RecommendationSource, Recommendations};
