use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use nuri_service::{
	ChatRequest, CleanupRequest, Error as ServiceError, InitPolicyRequest, SearchQuery,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/chat", post(chat))
		.route("/chat/init-policy", post(init_policy))
		.route("/chat/cleanup", post(cleanup))
		.route("/session/reset", post(session_reset))
		.route("/policies/search", get(search))
		.route("/policies/{id}", get(policy_detail))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/admin/warm-index", post(warm_index))
		.route("/admin/cache-stats", get(cache_stats))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn chat(
	State(state): State<AppState>,
	Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
	let response = state.service.chat(payload).await?;

	Ok(Json(response).into_response())
}

async fn init_policy(
	State(state): State<AppState>,
	Json(payload): Json<InitPolicyRequest>,
) -> Result<Response, ApiError> {
	let response = state.service.init_policy(payload).await?;

	Ok(Json(response).into_response())
}

async fn cleanup(
	State(state): State<AppState>,
	Json(payload): Json<CleanupRequest>,
) -> Result<Response, ApiError> {
	let response = state.service.cleanup(payload);

	Ok(Json(response).into_response())
}

#[derive(Debug, Deserialize)]
struct SessionResetQuery {
	session_id: String,
}

async fn session_reset(
	State(state): State<AppState>,
	Query(query): Query<SessionResetQuery>,
) -> Result<Response, ApiError> {
	let response = state.service.cleanup(CleanupRequest { session_id: query.session_id });

	Ok(Json(response).into_response())
}

async fn search(
	State(state): State<AppState>,
	Query(query): Query<SearchQuery>,
) -> Result<Response, ApiError> {
	let response = state.service.search(query).await?;

	Ok(Json(response).into_response())
}

async fn policy_detail(
	State(state): State<AppState>,
	Path(policy_id): Path<i64>,
) -> Result<Response, ApiError> {
	let record = state.service.policy_detail(policy_id).await?;

	Ok(Json(record).into_response())
}

async fn warm_index(State(state): State<AppState>) -> Result<Response, ApiError> {
	let report = state.service.warm_sparse_index().await?;

	Ok(Json(report).into_response())
}

async fn cache_stats(State(state): State<AppState>) -> Result<Response, ApiError> {
	Ok(Json(state.service.caches.stats()).into_response())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, error_code) = match &err {
			ServiceError::PolicyNotInitialized =>
				(StatusCode::PRECONDITION_FAILED, "policy_not_initialized"),
			ServiceError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
			ServiceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
			ServiceError::Qdrant { .. } => (StatusCode::BAD_GATEWAY, "vector_store_unavailable"),
			ServiceError::Storage { .. } => (StatusCode::BAD_GATEWAY, "metadata_store_unavailable"),
			ServiceError::Provider { .. } | ServiceError::WebSearch { .. } =>
				(StatusCode::BAD_GATEWAY, "provider_error"),
		};

		Self { status, error_code, message: err.to_string() }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code.to_string(), message: self.message };

		(self.status, Json(body)).into_response()
	}
}
