use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::task::JoinHandle;

use crate::config::SmtpConfig;
use crate::error::{AppError, Result};
use crate::models::Article;

const MAX_CONCURRENT_SENDS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::Mail(e.to_string()))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("invalid smtp.from: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Mail(format!("invalid recipient {}: {e}", email.to)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .body(email.body.clone())
            .map_err(|e| AppError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;
        Ok(())
    }
}

/// Stand-in used when no SMTP relay is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        tracing::info!(to = %email.to, subject = %email.subject, "SMTP not configured, email not sent");
        Ok(())
    }
}

/// Keeps every message in memory. Recipients listed in `failing` are
/// rejected.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
    failing: Vec<String>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        if self.failing.iter().any(|r| r == &email.to) {
            return Err(AppError::Mail(format!("mailbox {} unavailable", email.to)));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Builds notification emails and delivers them off the request path.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
    site_name: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, frontend_url: &str, site_name: &str) -> Self {
        Self {
            mailer,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            site_name: site_name.to_string(),
        }
    }

    pub fn verification_email(&self, to: &str, token: &str) -> Email {
        let link = format!("{}/verify-email/{}", self.frontend_url, token);
        Email {
            to: to.to_string(),
            subject: format!("{} - Email Verification", self.site_name),
            body: format!(
                "Welcome to {}! Please verify your email by clicking this link: {}",
                self.site_name, link
            ),
        }
    }

    pub fn article_email(&self, to: &str, article: &Article) -> Email {
        Email {
            to: to.to_string(),
            subject: format!("New Post in {}: {}", self.site_name, article.title),
            body: format!(
                "A new article has been posted on {}:\n\nTitle: {}\nCategory: {}\n\nVisit {} to read more.\n",
                self.site_name, article.title, article.category, self.frontend_url
            ),
        }
    }

    /// Sends `emails` on a spawned task. Failures are logged and counted,
    /// never returned to the caller and never retried.
    pub fn dispatch(&self, emails: Vec<Email>) -> JoinHandle<DispatchReport> {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move { deliver(mailer, emails).await })
    }

    /// Fan-out whose recipient list is itself produced in the background.
    pub fn dispatch_with<F, B>(&self, recipients: F, build: B) -> JoinHandle<DispatchReport>
    where
        F: Future<Output = Result<Vec<String>>> + Send + 'static,
        B: Fn(&str) -> Email + Send + 'static,
    {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            let recipients = match recipients.await {
                Ok(recipients) => recipients,
                Err(e) => {
                    tracing::error!("Could not load notification recipients: {}", e);
                    return DispatchReport::default();
                }
            };

            if recipients.is_empty() {
                tracing::info!("No verified users found to notify");
                return DispatchReport::default();
            }

            tracing::info!("Found {} verified users to notify", recipients.len());
            let emails = recipients.iter().map(|r| build(r)).collect();
            deliver(mailer, emails).await
        })
    }
}

async fn deliver(mailer: Arc<dyn Mailer>, emails: Vec<Email>) -> DispatchReport {
    let results: Vec<bool> = stream::iter(emails)
        .map(|email| {
            let mailer = Arc::clone(&mailer);
            async move {
                match mailer.send(&email).await {
                    Ok(()) => {
                        tracing::debug!("Notification email sent to {}", email.to);
                        true
                    }
                    Err(e) => {
                        tracing::error!("Could not send email to {}: {}", email.to, e);
                        false
                    }
                }
            }
        })
        .buffer_unordered(MAX_CONCURRENT_SENDS)
        .collect()
        .await;

    let sent = results.iter().filter(|ok| **ok).count();
    let report = DispatchReport {
        sent,
        failed: results.len() - sent,
    };
    tracing::info!("Finished sending notifications: {} sent, {} failed", report.sent, report.failed);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use chrono::Utc;

    fn article() -> Article {
        Article {
            id: 1,
            title: "Placement drive".to_string(),
            description: "Recruiters on campus".to_string(),
            source: "T&P cell".to_string(),
            category: Category::Placement,
            published_at: Utc::now(),
            ratings: Vec::new(),
            num_reviews: 0,
            average_rating: 0.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn verification_link_points_at_frontend() {
        let notifier = Notifier::new(Arc::new(LogMailer), "https://news.campus.edu/", "Campus News");
        let email = notifier.verification_email("a@campus.edu", "abc123");

        assert_eq!(email.to, "a@campus.edu");
        assert_eq!(email.subject, "Campus News - Email Verification");
        assert!(email
            .body
            .contains("https://news.campus.edu/verify-email/abc123"));
    }

    #[test]
    fn article_email_names_title_and_category() {
        let notifier = Notifier::new(Arc::new(LogMailer), "http://localhost:3000", "Campus News");
        let email = notifier.article_email("b@campus.edu", &article());

        assert_eq!(email.subject, "New Post in Campus News: Placement drive");
        assert!(email.body.contains("Category: placement"));
    }

    #[tokio::test]
    async fn one_failed_recipient_does_not_stop_the_rest() {
        let mailer = Arc::new(MemoryMailer::failing_for(&["bad@campus.edu"]));
        let notifier = Notifier::new(mailer.clone(), "http://localhost:3000", "Campus News");
        let article = article();

        let emails = ["a@campus.edu", "bad@campus.edu", "c@campus.edu"]
            .iter()
            .map(|to| notifier.article_email(to, &article))
            .collect();

        let report = notifier.dispatch(emails).await.unwrap();
        assert_eq!(report, DispatchReport { sent: 2, failed: 1 });

        let mut delivered: Vec<_> = mailer.sent().into_iter().map(|e| e.to).collect();
        delivered.sort();
        assert_eq!(delivered, vec!["a@campus.edu", "c@campus.edu"]);
    }

    #[tokio::test]
    async fn recipient_lookup_failure_is_swallowed() {
        let mailer = Arc::new(MemoryMailer::new());
        let notifier = Notifier::new(mailer.clone(), "http://localhost:3000", "Campus News");

        let report = notifier
            .dispatch_with(
                async { Err(AppError::Config("db offline".to_string())) },
                |to| Email {
                    to: to.to_string(),
                    subject: String::new(),
                    body: String::new(),
                },
            )
            .await
            .unwrap();

        assert_eq!(report, DispatchReport::default());
        assert!(mailer.sent().is_empty());
    }
}
