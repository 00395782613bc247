use axum::{
	Json, Router,
	extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use facade_domain::LocationInput;
use facade_service::{Error, ExpandRequest, MatchRequest, MatchResponse};

pub fn router(state: AppState) -> Router {
	let body_limit = state.body_limit();

	Router::new()
		.route("/health", get(health))
		.route("/v1/match", post(create_match))
		.route("/v1/match/expand", post(expand_match))
		.layer(DefaultBodyLimit::max(body_limit))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn create_match(
	State(state): State<AppState>,
	multipart: Multipart,
) -> Result<Json<MatchResponse>, ApiError> {
	let request = read_match_request(multipart).await?;
	let response = state.service.search(request).await?;

	Ok(Json(response))
}

async fn expand_match(
	State(state): State<AppState>,
	Json(payload): Json<ExpandRequest>,
) -> Result<Json<MatchResponse>, ApiError> {
	let response = state.service.expand(payload).await?;

	Ok(Json(response))
}

/// Collects the multipart form into a match request. Unknown fields are ignored; missing ones
/// are left for the service to judge.
async fn read_match_request(mut multipart: Multipart) -> Result<MatchRequest, ApiError> {
	let mut request = MatchRequest {
		session_id: String::new(),
		photo: Vec::new(),
		device_location: None,
		fallback_location: None,
		radius_override_m: None,
		limit: None,
		hints: None,
		user_label: None,
	};
	let mut device = LocationInput::default();
	let mut fallback = LocationInput::default();

	while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
		let name = field.name().unwrap_or_default().to_string();

		if name == "photo" {
			request.photo = field.bytes().await.map_err(multipart_error)?.to_vec();

			continue;
		}

		let text = field.text().await.map_err(multipart_error)?;

		match name.as_str() {
			"session_id" => request.session_id = text.trim().to_string(),
			"device_latitude" => device.latitude = parse_number(&name, &text)?,
			"device_longitude" => device.longitude = parse_number(&name, &text)?,
			"device_accuracy_m" => device.accuracy_m = parse_number(&name, &text)?,
			"fallback_latitude" => fallback.latitude = parse_number(&name, &text)?,
			"fallback_longitude" => fallback.longitude = parse_number(&name, &text)?,
			"fallback_accuracy_m" => fallback.accuracy_m = parse_number(&name, &text)?,
			"radius_override_m" => request.radius_override_m = parse_number(&name, &text)?,
			"limit" => request.limit = parse_number(&name, &text)?,
			"hints" => request.hints = non_empty(text),
			"user_label" => request.user_label = non_empty(text),
			_ => {},
		}
	}

	request.device_location = Some(device).filter(|input| *input != LocationInput::default());
	request.fallback_location = Some(fallback).filter(|input| *input != LocationInput::default());

	Ok(request)
}

fn parse_number(field: &str, raw: &str) -> Result<Option<f64>, ApiError> {
	let raw = raw.trim();

	if raw.is_empty() {
		return Ok(None);
	}

	match raw.parse::<f64>() {
		Ok(value) if value.is_finite() => Ok(Some(value)),
		_ => Err(json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			format!("{field} must be a finite number."),
		)),
	}
}

fn non_empty(raw: String) -> Option<String> {
	let trimmed = raw.trim();

	(!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn multipart_error(err: MultipartError) -> ApiError {
	json_error(err.status(), "invalid_request", err.body_text())
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
		match err {
			Error::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::LocationUnavailable { message } =>
				json_error(StatusCode::UNPROCESSABLE_ENTITY, "location_unavailable", message),
			Error::SessionNotFound { token } => json_error(
				StatusCode::NOT_FOUND,
				"session_not_found",
				format!("Session {token} was not found; start a new match."),
			),
			Error::Provider { message } => {
				tracing::warn!(error = %message, "Provider failure while matching.");

				json_error(StatusCode::BAD_GATEWAY, "provider_error", message)
			},
			Error::Storage { message } => {
				tracing::error!(error = %message, "Storage failure while matching.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message)
			},
			Error::Configuration { message } =>
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", message),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}
