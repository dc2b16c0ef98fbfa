use axum::{extract::State, http::StatusCode};

use super::envelope::ApiResponse;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::models::{CreateCommentRequest, HealthStatus, PageQuery};
use crate::core::{Comment, Creation, CreationSummary, EntityId, LifeStatus, Thought, Tool};
use crate::error::{AppError, AppResult};
use crate::facade::LikeCount;
use crate::state::AppState;

pub async fn healthcheck() -> ApiResponse<HealthStatus> {
    ApiResponse::ok(HealthStatus { status: "ok" })
}

pub async fn list_creations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<CreationSummary>>> {
    let creations = state.queries.list_creations(query.into()).await?;
    Ok(ApiResponse::ok(creations))
}

pub async fn get_creation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<ApiResponse<Creation>> {
    let creation = state.queries.get_creation(id).await?;
    Ok(ApiResponse::ok(creation))
}

pub async fn list_creation_comments(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<Comment>>> {
    let comments = state
        .queries
        .list_comments_for_creation(id, query.into())
        .await?;
    Ok(ApiResponse::ok(comments))
}

pub async fn like_creation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
) -> AppResult<ApiResponse<LikeCount>> {
    let likes = state.counters.like_creation(id).await?;
    Ok(ApiResponse::ok(likes))
}

pub async fn create_creation_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EntityId>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> AppResult<(StatusCode, ApiResponse<Comment>)> {
    let comment = state
        .counters
        .comment_on_creation(id, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(comment)))
}

pub async fn life_status(State(state): State<AppState>) -> AppResult<ApiResponse<LifeStatus>> {
    let status = state.queries.life_status().await?;
    Ok(ApiResponse::ok(status))
}

pub async fn like_life(State(state): State<AppState>) -> AppResult<ApiResponse<LikeCount>> {
    let likes = state.counters.like_life().await?;
    Ok(ApiResponse::ok(likes))
}

pub async fn list_life_comments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<Comment>>> {
    let comments = state.queries.list_life_comments(query.into()).await?;
    Ok(ApiResponse::ok(comments))
}

pub async fn create_life_comment(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> AppResult<(StatusCode, ApiResponse<Comment>)> {
    let comment = state.counters.comment_on_life(&payload.content).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(comment)))
}

pub async fn list_thoughts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<Thought>>> {
    let thoughts = state.queries.list_thoughts(query.into()).await?;
    Ok(ApiResponse::ok(thoughts))
}

pub async fn list_tools(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<Tool>>> {
    let tools = state.queries.list_tools(query.into()).await?;
    Ok(ApiResponse::ok(tools))
}

pub async fn fallback() -> AppError {
    AppError::not_found("route not found")
}
