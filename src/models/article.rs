use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use validator::Validate;

use super::Rating;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Placement,
    TechEvent,
    CulturalEvent,
    Cutoff,
}

#[derive(Debug, Error)]
#[error("unknown category '{0}'")]
pub struct ParseCategoryError(pub String);

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Placement,
        Category::TechEvent,
        Category::CulturalEvent,
        Category::Cutoff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Placement => "placement",
            Category::TechEvent => "tech-event",
            Category::CulturalEvent => "cultural-event",
            Category::Cutoff => "cutoff",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub source: String,
    pub category: Category,
    pub published_at: DateTime<Utc>,
    pub ratings: Vec<Rating>,
    pub num_reviews: i64,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewArticle {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Source is required"))]
    pub source: String,
    pub category: Category,
}

/// Admin edit of an article. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ArticleUpdate {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Source must not be empty"))]
    pub source: Option<String>,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ArticleFilter {
    /// `?category=` with no value means no filter.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub category: Option<Category>,
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
