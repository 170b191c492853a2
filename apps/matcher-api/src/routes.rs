use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use matcher_domain::PersonId;
use matcher_service::{
	Error, RoundReport, RoundView, SignupResponse, WaitingResponse, WithdrawResponse,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/waiting", get(list_waiting))
		.route("/v1/waiting/{person_id}", post(signup).delete(withdraw))
		.route("/v1/rounds/latest", get(latest_round))
		.route("/v1/rounds/{generation_id}", get(round_by_id))
		.with_state(state)
}

/// Routes that mutate round state. Serve only on the loopback admin bind.
pub fn admin_router(state: AppState) -> Router {
	Router::new().route("/v1/admin/rounds", post(trigger_round)).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn signup(
	State(state): State<AppState>,
	Path(person_id): Path<i64>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
	let response = state.service.signup(PersonId(person_id)).await?;
	let status = if response.created { StatusCode::CREATED } else { StatusCode::OK };

	Ok((status, Json(response)))
}

async fn withdraw(
	State(state): State<AppState>,
	Path(person_id): Path<i64>,
) -> Result<Json<WithdrawResponse>, ApiError> {
	let response = state.service.withdraw(PersonId(person_id)).await?;

	Ok(Json(response))
}

async fn list_waiting(State(state): State<AppState>) -> Result<Json<WaitingResponse>, ApiError> {
	let response = state.service.waiting().await?;

	Ok(Json(response))
}

async fn latest_round(State(state): State<AppState>) -> Result<Json<RoundView>, ApiError> {
	let response = state.service.view(None).await?;

	Ok(Json(response))
}

async fn round_by_id(
	State(state): State<AppState>,
	Path(generation_id): Path<i64>,
) -> Result<Json<RoundView>, ApiError> {
	let response = state.service.view(Some(generation_id)).await?;

	Ok(Json(response))
}

async fn trigger_round(State(state): State<AppState>) -> Result<Json<RoundReport>, ApiError> {
	let response = state.service.trigger().await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let message = err.to_string();

		match err {
			Error::InsufficientParticipants { .. } =>
				Self::new(StatusCode::CONFLICT, "insufficient_participants", message),
			Error::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", message),
			Error::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::Timeout { .. } => Self::new(StatusCode::SERVICE_UNAVAILABLE, "timeout", message),
			Error::Internal { .. } => {
				tracing::error!(error = %message, "Internal error.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal error.")
			},
			Error::Storage { .. } => {
				tracing::error!(error = %message, "Storage error.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "Storage error.")
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
