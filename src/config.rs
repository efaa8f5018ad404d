use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use url::Url;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    #[serde(default = "default_site_name")]
    pub site_name: String,

    pub admin_registration_key: Option<String>,

    #[serde(default = "default_session_ttl")]
    pub session_ttl_minutes: u32,

    #[serde(default)]
    pub ratings: RatingConfig,

    #[serde(default)]
    pub recommendations: RecommendationConfig,

    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingConfig {
    #[serde(default = "default_min_rating")]
    pub min_rating: f64,

    #[serde(default = "default_max_rating")]
    pub max_rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Ratings at or above this value count as a like.
    #[serde(default = "default_like_threshold")]
    pub like_threshold: f64,

    #[serde(default = "default_neighbor_limit")]
    pub neighbor_limit: usize,

    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "default_smtp_from")]
    pub from: String,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("campus-news");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("news.db").to_string_lossy().to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_site_name() -> String {
    "Campus News".to_string()
}

fn default_session_ttl() -> u32 {
    60
}

fn default_min_rating() -> f64 {
    1.0
}

fn default_max_rating() -> f64 {
    5.0
}

fn default_like_threshold() -> f64 {
    4.0
}

fn default_neighbor_limit() -> usize {
    10
}

fn default_result_limit() -> usize {
    5
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "Campus News <no-reply@localhost>".to_string()
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            min_rating: default_min_rating(),
            max_rating: default_max_rating(),
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            like_threshold: default_like_threshold(),
            neighbor_limit: default_neighbor_limit(),
            result_limit: default_result_limit(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind_address: default_bind_address(),
            frontend_url: default_frontend_url(),
            site_name: default_site_name(),
            admin_registration_key: None,
            session_ttl_minutes: default_session_ttl(),
            ratings: RatingConfig::default(),
            recommendations: RecommendationConfig::default(),
            smtp: None,
        }
    }
}

impl Config {
    /// Loads the config file at `path`, writing one with defaults on first
    /// run, then applies environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("campus-news")
            .join("config.toml")
    }

    pub fn apply_env_overrides(&mut self) {
        override_from_env("CAMPUS_NEWS_DB_PATH", &mut self.db_path);
        override_from_env("CAMPUS_NEWS_BIND", &mut self.bind_address);
        override_from_env("FRONTEND_URL", &mut self.frontend_url);

        if let Ok(key) = env::var("ADMIN_REGISTRATION_KEY") {
            self.admin_registration_key = Some(key);
        }

        if let Ok(host) = env::var("SMTP_HOST") {
            let smtp = self.smtp.get_or_insert_with(|| SmtpConfig {
                host: host.clone(),
                port: default_smtp_port(),
                username: None,
                password: None,
                from: default_smtp_from(),
            });
            smtp.host = host;
        }

        if let Some(smtp) = self.smtp.as_mut() {
            override_from_env("SMTP_PORT", &mut smtp.port);
            override_from_env("SMTP_FROM", &mut smtp.from);
            if let Ok(username) = env::var("SMTP_USERNAME") {
                smtp.username = Some(username);
            }
            if let Ok(password) = env::var("SMTP_PASSWORD") {
                smtp.password = Some(password);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ratings = &self.ratings;
        if !(ratings.min_rating.is_finite() && ratings.max_rating.is_finite())
            || ratings.min_rating >= ratings.max_rating
        {
            return Err(AppError::Config(format!(
                "invalid rating range {}..={}",
                ratings.min_rating, ratings.max_rating
            )));
        }

        let threshold = self.recommendations.like_threshold;
        if threshold < ratings.min_rating || threshold > ratings.max_rating {
            return Err(AppError::Config(format!(
                "like_threshold {threshold} is outside the rating range"
            )));
        }

        if self.recommendations.neighbor_limit == 0 || self.recommendations.result_limit == 0 {
            return Err(AppError::Config(
                "recommendation limits must be positive".to_string(),
            ));
        }

        if self.session_ttl_minutes == 0 {
            return Err(AppError::Config(
                "session_ttl_minutes must be positive".to_string(),
            ));
        }

        Url::parse(&self.frontend_url)
            .map_err(|e| AppError::Config(format!("invalid frontend_url: {e}")))?;

        Ok(())
    }
}

fn override_from_env<T: FromStr>(key: &str, target: &mut T)
where
    T::Err: Display,
{
    let Ok(raw) = env::var(key) else {
        return;
    };

    match raw.parse() {
        Ok(value) => {
            tracing::info!("Using {key} from environment");
            *target = value;
        }
        Err(e) => tracing::warn!("Ignoring invalid {key} value: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            db_path = "/tmp/news.db"
            admin_registration_key = "letmein"

            [recommendations]
            neighbor_limit = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.db_path, "/tmp/news.db");
        assert_eq!(config.bind_address, "0.0.0.0:5000");
        assert_eq!(config.admin_registration_key.as_deref(), Some("letmein"));
        assert_eq!(config.recommendations.neighbor_limit, 3);
        assert_eq!(config.recommendations.result_limit, 5);
        assert_eq!(config.recommendations.like_threshold, 4.0);
        assert_eq!(config.ratings, RatingConfig::default());
        assert!(config.smtp.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn smtp_section_uses_default_port() {
        let config: Config = toml::from_str(
            r#"
            [smtp]
            host = "smtp.example.edu"
            username = "news"
            "#,
        )
        .unwrap();

        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.example.edu");
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.username.as_deref(), Some("news"));
        assert!(smtp.password.is_none());
    }

    #[test]
    fn validate_rejects_inverted_rating_range() {
        let mut config = Config::default();
        config.ratings.min_rating = 5.0;
        config.ratings.max_rating = 1.0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_threshold_outside_range() {
        let mut config = Config::default();
        config.recommendations.like_threshold = 6.0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.recommendations.result_limit = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session_ttl_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn first_load_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());

        let reloaded: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded.site_name, config.site_name);
        assert_eq!(reloaded.session_ttl_minutes, 60);
    }
}
