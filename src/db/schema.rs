//! Table definitions and the process-wide entity registry.
//!
//! Every persisted model implements [`Entity`]. A definition is recorded the
//! first time it is registered and repeat registrations are no-ops, so each
//! schema is defined exactly once per process no matter how many
//! repositories are opened.

use std::sync::{Mutex, OnceLock, PoisonError};

use crate::models::{Article, Rating, Session, User};

pub trait Entity {
    const NAME: &'static str;
    const SCHEMA: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDef {
    pub name: &'static str,
    pub schema: &'static str,
}

static REGISTRY: OnceLock<Mutex<Vec<EntityDef>>> = OnceLock::new();

fn registry() -> &'static Mutex<Vec<EntityDef>> {
    REGISTRY.get_or_init(|| Mutex::new(Vec::new()))
}

/// Returns `true` if this call defined the entity, `false` if it was
/// already registered.
pub fn register<E: Entity>() -> bool {
    let mut defs = registry().lock().unwrap_or_else(PoisonError::into_inner);

    if defs.iter().any(|d| d.name == E::NAME) {
        tracing::debug!("Entity {} already registered", E::NAME);
        return false;
    }

    defs.push(EntityDef {
        name: E::NAME,
        schema: E::SCHEMA,
    });
    tracing::debug!("Registered entity {}", E::NAME);
    true
}

/// Registers every entity this crate persists and returns the definitions
/// in dependency order.
pub fn definitions() -> Vec<EntityDef> {
    register::<User>();
    register::<Session>();
    register::<Article>();
    register::<Rating>();

    registry()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[cfg(test)]
fn is_registered(name: &str) -> bool {
    registry()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .any(|d| d.name == name)
}

impl Entity for User {
    const NAME: &'static str = "users";
    const SCHEMA: &'static str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    is_verified INTEGER NOT NULL DEFAULT 0,
    verification_token TEXT UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_users_is_verified ON users(is_verified);
"#;
}

impl Entity for Session {
    const NAME: &'static str = "sessions";
    const SCHEMA: &'static str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
"#;
}

impl Entity for Article {
    const NAME: &'static str = "articles";
    const SCHEMA: &'static str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    source TEXT NOT NULL,
    category TEXT NOT NULL
        CHECK (category IN ('placement', 'tech-event', 'cultural-event', 'cutoff')),
    published_at TEXT NOT NULL,
    num_reviews INTEGER NOT NULL DEFAULT 0,
    average_rating REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category);
CREATE INDEX IF NOT EXISTS idx_articles_average_rating ON articles(average_rating DESC);
CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at DESC);
"#;
}

impl Entity for Rating {
    const NAME: &'static str = "ratings";
    const SCHEMA: &'static str = r#"
CREATE TABLE IF NOT EXISTS ratings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id),
    rating REAL NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(article_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_ratings_user_rating ON ratings(user_id, rating);
CREATE INDEX IF NOT EXISTS idx_ratings_article_id ON ratings(article_id);
"#;
}
