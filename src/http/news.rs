use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::{Article, ArticleFilter, ArticleUpdate, NewArticle, RateRequest};
use crate::state::AppState;

use super::extract::{AdminUser, CurrentUser};

pub async fn list_news(
    State(state): State<AppState>,
    query: std::result::Result<Query<ArticleFilter>, QueryRejection>,
) -> Result<Json<Vec<Article>>> {
    let Query(filter) = query?;
    Ok(Json(state.news.list(filter).await?))
}

pub async fn get_news(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Article>> {
    let Path(id) = path?;
    Ok(Json(state.news.get(id).await?))
}

pub async fn create_news(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: std::result::Result<Json<NewArticle>, JsonRejection>,
) -> Result<(StatusCode, Json<Article>)> {
    let Json(input) = payload?;
    let published = state.news.create(input).await?;
    tracing::debug!(admin_id = admin.id, article_id = published.article.id, "Published article");
    Ok((StatusCode::CREATED, Json(published.article)))
}

pub async fn update_news(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    path: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<ArticleUpdate>, JsonRejection>,
) -> Result<Json<Article>> {
    let Path(id) = path?;
    let Json(update) = payload?;
    Ok(Json(state.news.update(id, update).await?))
}

pub async fn delete_news(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>> {
    let Path(id) = path?;
    state.news.delete(id).await?;
    Ok(Json(json!({ "message": "News item deleted successfully" })))
}

pub async fn rate_news(
    State(state): State<AppState>,
    caller: CurrentUser,
    path: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<RateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Path(id) = path?;
    let Json(request) = payload?;
    let summary = state
        .ratings
        .submit_rating(id, caller.user.id, request.rating)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Rating added successfully",
            "articleId": summary.article_id,
            "numReviews": summary.num_reviews,
            "averageRating": summary.average_rating,
        })),
    ))
}

pub async fn recommended_news(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<Vec<Article>>> {
    let recommendations = state.recommendations.recommend(caller.user.id).await?;
    tracing::info!(
        user_id = caller.user.id,
        source = ?recommendations.source,
        count = recommendations.articles.len(),
        "Served recommendations"
    );
    Ok(Json(recommendations.articles))
}
