use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, Value, ValueRef};
use rusqlite::{
    params, params_from_iter, ErrorCode, OptionalExtension, Params, Row, ToSql,
    TransactionBehavior,
};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{
    Article, ArticleUpdate, Category, Neighbor, NewArticle, NewUser, Rating, RatingOutcome,
    RatingSummary, Session, User,
};

use super::schema;

const ARTICLE_COLUMNS: &str = "id, title, description, source, category, published_at, \
     num_reviews, average_rating, created_at, updated_at";

const USER_COLUMNS: &str =
    "id, name, email, password_hash, is_admin, is_verified, verification_token, created_at";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        let definitions = schema::definitions();

        conn.call(move |conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            for def in &definitions {
                conn.execute_batch(def.schema)?;
            }
            Ok(())
        })
        .await?;

        tracing::info!("Opened database at {}", db_path);
        Ok(Self { conn })
    }

    // Article operations

    pub async fn insert_article(&self, article: NewArticle) -> Result<Article> {
        let article = self
            .conn
            .call(move |conn| {
                let now = timestamp(Utc::now());
                conn.execute(
                    r#"INSERT INTO articles (title, description, source, category, published_at, created_at, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5)"#,
                    params![
                        article.title,
                        article.description,
                        article.source,
                        article.category,
                        now,
                    ],
                )?;
                let id = conn.last_insert_rowid();
                let article = fetch_article(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| Ok(fetch_article(conn, id)?))
            .await?;
        Ok(article)
    }

    /// Newest first, optionally restricted to one category.
    pub async fn list_articles(&self, category: Option<Category>) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let articles = match category {
                    Some(category) => query_articles(
                        conn,
                        &format!(
                            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE category = ?1 \
                             ORDER BY published_at DESC, id DESC"
                        ),
                        params![category],
                    )?,
                    None => query_articles(
                        conn,
                        &format!(
                            "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY published_at DESC, id DESC"
                        ),
                        params![],
                    )?,
                };
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Highest average rating first; ties keep insertion order.
    pub async fn top_rated_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let limit = limit as i64;
        let articles = self
            .conn
            .call(move |conn| {
                let articles = query_articles(
                    conn,
                    &format!(
                        "SELECT {ARTICLE_COLUMNS} FROM articles \
                         ORDER BY average_rating DESC, id ASC LIMIT ?1"
                    ),
                    params![limit],
                )?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn update_article(&self, id: i64, update: ArticleUpdate) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"UPDATE articles SET
                           title = COALESCE(?2, title),
                           description = COALESCE(?3, description),
                           source = COALESCE(?4, source),
                           category = COALESCE(?5, category),
                           updated_at = ?6
                       WHERE id = ?1"#,
                    params![
                        id,
                        update.title,
                        update.description,
                        update.source,
                        update.category,
                        timestamp(Utc::now()),
                    ],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                Ok(fetch_article(conn, id)?)
            })
            .await?;
        Ok(article)
    }

    /// Ratings go with the article through the foreign key cascade.
    pub async fn delete_article(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute("DELETE FROM articles WHERE id = ?1", params![id])?;
                Ok(changed > 0)
            })
            .await?;
        Ok(deleted)
    }

    // Rating operations

    /// Appends a rating and recomputes the article aggregates over the full
    /// rating set in one immediate transaction, so concurrent submissions
    /// cannot overwrite each other's totals.
    pub async fn insert_rating(&self, article_id: i64, user_id: i64, value: f64) -> Result<RatingOutcome> {
        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM articles WHERE id = ?1)",
                    params![article_id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Ok(RatingOutcome::ArticleNotFound);
                }

                let inserted = tx.execute(
                    r#"INSERT INTO ratings (article_id, user_id, rating, created_at)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(article_id, user_id) DO NOTHING"#,
                    params![article_id, user_id, value, timestamp(Utc::now())],
                )?;
                if inserted == 0 {
                    return Ok(RatingOutcome::AlreadyRated);
                }

                tx.execute(
                    r#"UPDATE articles SET
                           num_reviews = (SELECT COUNT(*) FROM ratings WHERE article_id = ?1),
                           average_rating = COALESCE((SELECT AVG(rating) FROM ratings WHERE article_id = ?1), 0)
                       WHERE id = ?1"#,
                    params![article_id],
                )?;

                let summary = tx.query_row(
                    "SELECT num_reviews, average_rating FROM articles WHERE id = ?1",
                    params![article_id],
                    |row| {
                        Ok(RatingSummary {
                            article_id,
                            num_reviews: row.get(0)?,
                            average_rating: row.get(1)?,
                        })
                    },
                )?;

                tx.commit()?;
                Ok(RatingOutcome::Recorded(summary))
            })
            .await?;
        Ok(outcome)
    }

    /// Ids of the articles `user_id` rated at or above `threshold`.
    pub async fn liked_article_ids(&self, user_id: i64, threshold: f64) -> Result<Vec<i64>> {
        let ids = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT article_id FROM ratings WHERE user_id = ?1 AND rating >= ?2 ORDER BY article_id",
                )?;
                let ids = stmt
                    .query_map(params![user_id, threshold], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Groups the other users' likes on `article_ids` by user and ranks them
    /// by shared-like count.
    pub async fn similar_users(
        &self,
        user_id: i64,
        article_ids: Vec<i64>,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<Neighbor>> {
        if article_ids.is_empty() {
            return Ok(Vec::new());
        }

        let neighbors = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    r#"SELECT user_id, COUNT(*) AS shared_likes
                       FROM ratings
                       WHERE article_id IN ({})
                         AND rating >= ?1
                         AND user_id != ?2
                       GROUP BY user_id
                       ORDER BY shared_likes DESC, user_id ASC
                       LIMIT ?3"#,
                    placeholders(4, article_ids.len())
                );

                let mut values = vec![
                    Value::Real(threshold),
                    Value::Integer(user_id),
                    Value::Integer(limit as i64),
                ];
                values.extend(article_ids.into_iter().map(Value::Integer));

                let mut stmt = conn.prepare(&sql)?;
                let neighbors = stmt
                    .query_map(params_from_iter(values.iter()), |row| {
                        Ok(Neighbor {
                            user_id: row.get(0)?,
                            shared_likes: row.get(1)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(neighbors)
            })
            .await?;
        Ok(neighbors)
    }

    /// Articles any of `user_ids` rated at or above `threshold`, minus every
    /// article `exclude_user` has rated, best average first.
    pub async fn articles_liked_by(
        &self,
        user_ids: Vec<i64>,
        exclude_user: i64,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<Article>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    r#"SELECT {ARTICLE_COLUMNS} FROM articles a
                       WHERE EXISTS (
                           SELECT 1 FROM ratings r
                           WHERE r.article_id = a.id
                             AND r.rating >= ?1
                             AND r.user_id IN ({})
                       )
                       AND NOT EXISTS (
                           SELECT 1 FROM ratings mine
                           WHERE mine.article_id = a.id AND mine.user_id = ?2
                       )
                       ORDER BY a.average_rating DESC, a.id ASC
                       LIMIT ?3"#,
                    placeholders(4, user_ids.len())
                );

                let mut values = vec![
                    Value::Real(threshold),
                    Value::Integer(exclude_user),
                    Value::Integer(limit as i64),
                ];
                values.extend(user_ids.into_iter().map(Value::Integer));

                let articles = query_articles(conn, &sql, params_from_iter(values.iter()))?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    // User operations

    pub async fn insert_user(&self, user: NewUser) -> Result<User> {
        let result = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO users (name, email, password_hash, is_admin, verification_token)
                       VALUES (?1, ?2, ?3, ?4, ?5)"#,
                    params![
                        user.name,
                        user.email,
                        user.password_hash,
                        user.is_admin,
                        user.verification_token,
                    ],
                )?;
                let id = conn.last_insert_rowid();
                let user = conn.query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    params![id],
                    user_from_row,
                )?;
                Ok(user)
            })
            .await;

        match result {
            Err(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(AppError::Conflict("User already exists".to_string()))
            }
            other => Ok(other?),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        let user = self
            .conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                        params![email],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                        params![id],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await?;
        Ok(user)
    }

    /// Marks the token's owner verified and clears the token. A token can
    /// only ever be redeemed once.
    pub async fn verify_user(&self, token: &str) -> Result<Option<User>> {
        let token = token.to_string();
        let user = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let id: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM users WHERE verification_token = ?1",
                        params![token],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(id) = id else {
                    return Ok(None);
                };

                tx.execute(
                    "UPDATE users SET is_verified = 1, verification_token = NULL WHERE id = ?1",
                    params![id],
                )?;
                let user = tx.query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    params![id],
                    user_from_row,
                )?;

                tx.commit()?;
                Ok(Some(user))
            })
            .await?;
        Ok(user)
    }

    pub async fn verified_user_emails(&self) -> Result<Vec<String>> {
        let emails = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT email FROM users WHERE is_verified = 1 ORDER BY id")?;
                let emails = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(emails)
            })
            .await?;
        Ok(emails)
    }

    // Session operations

    pub async fn insert_session(&self, session: Session) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                    params![session.token, session.user_id, timestamp(session.expires_at)],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn find_session_user(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let token = token.to_string();
        let user = self
            .conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM sessions s JOIN users u ON u.id = s.user_id \
                             WHERE s.token = ?1 AND s.expires_at > ?2",
                            prefixed(USER_COLUMNS, "u")
                        ),
                        params![token, timestamp(now)],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await?;
        Ok(user)
    }

    pub async fn delete_session(&self, token: &str) -> Result<bool> {
        let token = token.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
                Ok(changed > 0)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let removed = self
            .conn
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM sessions WHERE expires_at <= ?1",
                    params![timestamp(now)],
                )?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }
}

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Fixed-width UTC timestamps so stored values compare correctly as text.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn fetch_article(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<Article>> {
    let article = conn
        .query_row(
            &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"),
            params![id],
            article_from_row,
        )
        .optional()?;

    match article {
        Some(mut article) => {
            article.ratings = load_ratings(conn, article.id)?;
            Ok(Some(article))
        }
        None => Ok(None),
    }
}

fn query_articles<P: Params>(
    conn: &rusqlite::Connection,
    sql: &str,
    params: P,
) -> rusqlite::Result<Vec<Article>> {
    let mut stmt = conn.prepare(sql)?;
    let mut articles = stmt
        .query_map(params, article_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for article in &mut articles {
        article.ratings = load_ratings(conn, article.id)?;
    }
    Ok(articles)
}

fn load_ratings(conn: &rusqlite::Connection, article_id: i64) -> rusqlite::Result<Vec<Rating>> {
    let mut stmt = conn.prepare_cached(
        "SELECT user_id, rating, created_at FROM ratings WHERE article_id = ?1 ORDER BY id",
    )?;
    let ratings = stmt
        .query_map(params![article_id], |row| {
            Ok(Rating {
                user_id: row.get(0)?,
                rating: row.get(1)?,
                created_at: datetime_column(row, 2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ratings)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56.000Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn datetime_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp '{raw}'").into(),
        )
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        source: row.get(3)?,
        category: row.get(4)?,
        published_at: datetime_column(row, 5)?,
        ratings: Vec::new(),
        num_reviews: row.get(6)?,
        average_rating: row.get(7)?,
        created_at: datetime_column(row, 8)?,
        updated_at: datetime_column(row, 9)?,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get(4)?,
        is_verified: row.get(5)?,
        verification_token: row.get(6)?,
        created_at: datetime_column(row, 7)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) async fn repo() -> Repository {
        Repository::new(":memory:").await.unwrap()
    }

    pub(crate) async fn seed_user(repo: &Repository, name: &str, verified: bool) -> User {
        let user = repo
            .insert_user(NewUser {
                name: name.to_string(),
                email: format!("{}@campus.edu", name.to_lowercase()),
                password_hash: "hash".to_string(),
                is_admin: false,
                verification_token: format!("token-{name}"),
            })
            .await
            .unwrap();

        if verified {
            repo.verify_user(&format!("token-{name}")).await.unwrap().unwrap()
        } else {
            user
        }
    }

    pub(crate) async fn seed_article(repo: &Repository, title: &str, category: Category) -> Article {
        repo.insert_article(NewArticle {
            title: title.to_string(),
            description: format!("About {title}"),
            source: "Student Council".to_string(),
            category,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_fetch_article() {
        let repo = repo().await;
        let article = seed_article(&repo, "Hackathon", Category::TechEvent).await;

        assert_eq!(article.num_reviews, 0);
        assert_eq!(article.average_rating, 0.0);
        assert!(article.ratings.is_empty());

        let fetched = repo.get_article(article.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Hackathon");
        assert_eq!(fetched.category, Category::TechEvent);
        assert!(repo.get_article(article.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_by_category() {
        let repo = repo().await;
        seed_article(&repo, "Drive", Category::Placement).await;
        seed_article(&repo, "Fest", Category::CulturalEvent).await;
        seed_article(&repo, "Second drive", Category::Placement).await;

        let all = repo.list_articles(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let placements = repo.list_articles(Some(Category::Placement)).await.unwrap();
        assert_eq!(placements.len(), 2);
        assert!(placements.iter().all(|a| a.category == Category::Placement));
        // newest first
        assert_eq!(placements[0].title, "Second drive");
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let repo = repo().await;
        let article = seed_article(&repo, "Cutoffs", Category::Cutoff).await;

        let updated = repo
            .update_article(
                article.id,
                ArticleUpdate {
                    title: Some("Cutoffs 2026".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Cutoffs 2026");
        assert_eq!(updated.description, article.description);
        assert_eq!(updated.category, Category::Cutoff);

        let missing = repo
            .update_article(article.id + 1, ArticleUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn rating_updates_aggregates_and_rejects_duplicates() {
        let repo = repo().await;
        let a = seed_user(&repo, "A", true).await;
        let b = seed_user(&repo, "B", true).await;
        let article = seed_article(&repo, "Fest", Category::CulturalEvent).await;

        let first = repo.insert_rating(article.id, a.id, 5.0).await.unwrap();
        assert_eq!(
            first,
            RatingOutcome::Recorded(RatingSummary {
                article_id: article.id,
                num_reviews: 1,
                average_rating: 5.0,
            })
        );

        let second = repo.insert_rating(article.id, b.id, 2.0).await.unwrap();
        let RatingOutcome::Recorded(summary) = second else {
            panic!("expected recorded rating");
        };
        assert_eq!(summary.num_reviews, 2);
        assert!((summary.average_rating - 3.5).abs() < 1e-9);

        let dup = repo.insert_rating(article.id, a.id, 1.0).await.unwrap();
        assert_eq!(dup, RatingOutcome::AlreadyRated);

        let stored = repo.get_article(article.id).await.unwrap().unwrap();
        assert_eq!(stored.num_reviews, 2);
        assert_eq!(stored.ratings.len(), 2);
        assert!((stored.average_rating - 3.5).abs() < 1e-9);

        let missing = repo.insert_rating(article.id + 10, a.id, 4.0).await.unwrap();
        assert_eq!(missing, RatingOutcome::ArticleNotFound);
    }

    #[tokio::test]
    async fn deleting_article_cascades_ratings() {
        let repo = repo().await;
        let user = seed_user(&repo, "A", true).await;
        let article = seed_article(&repo, "Fest", Category::CulturalEvent).await;
        repo.insert_rating(article.id, user.id, 4.0).await.unwrap();

        assert!(repo.delete_article(article.id).await.unwrap());
        assert!(!repo.delete_article(article.id).await.unwrap());
        assert!(repo.liked_article_ids(user.id, 4.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn similar_users_ranked_by_shared_likes() {
        let repo = repo().await;
        let me = seed_user(&repo, "Me", true).await;
        let close = seed_user(&repo, "Close", true).await;
        let far = seed_user(&repo, "Far", true).await;
        let x = seed_article(&repo, "X", Category::TechEvent).await;
        let y = seed_article(&repo, "Y", Category::TechEvent).await;

        for article in [&x, &y] {
            repo.insert_rating(article.id, me.id, 5.0).await.unwrap();
            repo.insert_rating(article.id, close.id, 4.0).await.unwrap();
        }
        repo.insert_rating(x.id, far.id, 4.5).await.unwrap();
        repo.insert_rating(y.id, far.id, 2.0).await.unwrap();

        let liked = repo.liked_article_ids(me.id, 4.0).await.unwrap();
        assert_eq!(liked, vec![x.id, y.id]);

        let neighbors = repo.similar_users(me.id, liked, 4.0, 10).await.unwrap();
        assert_eq!(
            neighbors,
            vec![
                Neighbor { user_id: close.id, shared_likes: 2 },
                Neighbor { user_id: far.id, shared_likes: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let repo = repo().await;
        seed_user(&repo, "A", false).await;

        let err = repo
            .insert_user(NewUser {
                name: "Other".to_string(),
                email: "a@campus.edu".to_string(),
                password_hash: "hash".to_string(),
                is_admin: false,
                verification_token: "another".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn verification_token_is_single_use() {
        let repo = repo().await;
        let user = seed_user(&repo, "A", false).await;
        assert!(!user.is_verified);
        assert_eq!(user.verification_token.as_deref(), Some("token-A"));

        let verified = repo.verify_user("token-A").await.unwrap().unwrap();
        assert!(verified.is_verified);
        assert!(verified.verification_token.is_none());

        assert!(repo.verify_user("token-A").await.unwrap().is_none());
        assert_eq!(repo.verified_user_emails().await.unwrap(), vec!["a@campus.edu"]);
    }

    #[tokio::test]
    async fn sessions_expire() {
        let repo = repo().await;
        let user = seed_user(&repo, "A", true).await;
        let now = Utc::now();

        repo.insert_session(Session {
            token: "live".to_string(),
            user_id: user.id,
            expires_at: now + Duration::minutes(5),
        })
        .await
        .unwrap();
        repo.insert_session(Session {
            token: "stale".to_string(),
            user_id: user.id,
            expires_at: now - Duration::minutes(5),
        })
        .await
        .unwrap();

        let found = repo.find_session_user("live", now).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(repo.find_session_user("stale", now).await.unwrap().is_none());

        assert_eq!(repo.delete_expired_sessions(now).await.unwrap(), 1);
        assert!(repo.delete_session("live").await.unwrap());
        assert!(repo.find_session_user("live", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.db");
        let path = path.to_str().unwrap();

        {
            let repo = Repository::new(path).await.unwrap();
            seed_article(&repo, "Persisted", Category::Placement).await;
        }

        let repo = Repository::new(path).await.unwrap();
        let articles = repo.list_articles(None).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Persisted");
    }
}
