use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use rand::distributions::{Alphanumeric, Distribution};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use validator::Validate;

use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{LoginRequest, LoginResponse, NewUser, RegisterRequest, Session, User, UserProfile};

use super::notifier::{DispatchReport, Notifier};

const SESSION_TOKEN_LENGTH: usize = 64;
const VERIFICATION_TOKEN_BYTES: usize = 32;

pub struct Registered {
    pub user: User,
    pub notification: JoinHandle<DispatchReport>,
}

pub struct AuthService {
    repository: Arc<Repository>,
    notifier: Notifier,
    admin_registration_key: Option<String>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(repository: Arc<Repository>, notifier: Notifier, config: &Config) -> Self {
        Self {
            repository,
            notifier,
            admin_registration_key: config.admin_registration_key.clone(),
            session_ttl: Duration::minutes(i64::from(config.session_ttl_minutes)),
        }
    }

    /// Creates an unverified account and mails its verification link.
    /// With `admin_only` the request must carry the admin registration code.
    pub async fn register(&self, request: RegisterRequest, admin_only: bool) -> Result<Registered> {
        request.validate()?;

        let is_admin = match (&request.admin_code, &self.admin_registration_key) {
            (Some(code), Some(key)) => code == key,
            _ => false,
        };
        if admin_only && !is_admin {
            return Err(AppError::Forbidden(
                "Invalid admin registration code".to_string(),
            ));
        }

        let email = normalize_email(&request.email);
        if self.repository.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(request.password).await?;
        let token = verification_token();

        let user = self
            .repository
            .insert_user(NewUser {
                name: request.name.trim().to_string(),
                email,
                password_hash,
                is_admin,
                verification_token: token.clone(),
            })
            .await?;
        tracing::info!(user_id = user.id, is_admin, "Registered user");

        let email = self.notifier.verification_email(&user.email, &token);
        let notification = self.notifier.dispatch(vec![email]);

        Ok(Registered { user, notification })
    }

    pub async fn verify_email(&self, token: &str) -> Result<User> {
        let user = self.repository.verify_user(token).await?.ok_or_else(|| {
            AppError::InvalidInput("Invalid or expired verification token.".to_string())
        })?;
        tracing::info!(user_id = user.id, "Email verified");
        Ok(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        request.validate()?;

        let invalid = || AppError::InvalidInput("Invalid credentials".to_string());

        let user = self
            .repository
            .find_user_by_email(&normalize_email(&request.email))
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(request.password, user.password_hash.clone()).await? {
            return Err(invalid());
        }

        if !user.is_verified {
            return Err(AppError::Unauthenticated(
                "Please verify your email before logging in.".to_string(),
            ));
        }

        let now = Utc::now();
        let purged = self.repository.delete_expired_sessions(now).await?;
        if purged > 0 {
            tracing::debug!("Purged {} expired sessions", purged);
        }

        let token = session_token();
        self.repository
            .insert_session(Session {
                token: token.clone(),
                user_id: user.id,
                expires_at: now + self.session_ttl,
            })
            .await?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok(LoginResponse {
            token,
            user: UserProfile::from(&user),
        })
    }

    /// Resolves a bearer token to its user.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        self.repository
            .find_session_user(token, Utc::now())
            .await?
            .ok_or_else(|| AppError::Unauthenticated("Not authorized, token failed".to_string()))
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.repository.delete_session(token).await?;
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn verification_token() -> String {
    let mut bytes = [0u8; VERIFICATION_TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn session_token() -> String {
    let mut rng = StdRng::from_entropy();
    String::from_iter((0..SESSION_TOKEN_LENGTH).map(|_| Alphanumeric.sample(&mut rng) as char))
}

pub async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill(&mut salt);
        let salt = SaltString::encode_b64(&salt)
            .map_err(|e| AppError::PasswordHash(e.to_string()))?;
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    })
    .await
    .map_err(anyhow::Error::from)?
}

pub async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&hash).map_err(|e| AppError::PasswordHash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(anyhow::Error::from)?
}
