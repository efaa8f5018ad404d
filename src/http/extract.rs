use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

/// Caller identity resolved from an `Authorization: Bearer <token>` header.
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

/// A [`CurrentUser`] that also holds the admin flag.
pub struct AdminUser(pub User);

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthenticated("Not authorized, no token".to_string()))?;
        let user = state.auth.authenticate(&token).await?;
        Ok(Self { user, token })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser { user, .. } = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            tracing::warn!(user_id = user.id, "Non-admin attempted an admin action");
            return Err(AppError::Forbidden("Not authorized as an admin".to_string()));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc123"))).as_deref(), Some("abc123"));
        assert_eq!(bearer_token(&parts(Some("Bearer   "))), None);
        assert_eq!(bearer_token(&parts(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
