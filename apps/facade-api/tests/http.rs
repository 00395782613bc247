use std::sync::Arc;

use axum::{
	body::{self, Body},
	http::{Request, StatusCode, header::CONTENT_TYPE},
};
use serde_json::{Map, Value};
use tower::util::ServiceExt;

use facade_api::{routes, state::AppState};
use facade_config::{Cache, Config, ImageProviderConfig, Pool, Providers, Scoring, Service};
use facade_domain::{Candidate, StructuralFeatures};
use facade_service::{DigestScorer, FacadeService, StaticCandidatePool};

const BOUNDARY: &str = "facade-test-boundary";
const ORIGIN: (f64, f64) = (43.970_837, -75.619_230);

fn test_config() -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
			max_photo_bytes: 65_536,
		},
		pool: Pool { source: "static".to_string(), dataset_path: None },
		scoring: Scoring { mode: "digest".to_string(), concurrency: 2 },
		cache: Cache { path: std::env::temp_dir().join("facade_api_unused.json") },
		providers: Providers {
			image: ImageProviderConfig {
				timeout_ms: 1_000,
				max_bytes: 65_536,
				default_headers: Map::new(),
			},
			listing: None,
			embedding: None,
		},
	}
}

fn listing(id: &str, north_m: f64) -> Candidate {
	Candidate {
		property_id: id.to_string(),
		address_line: format!("{id} Bridge Street, Lowville, NY"),
		latitude: ORIGIN.0 + north_m / 111_195.0,
		longitude: ORIGIN.1,
		preview_image_url: Some(format!("https://img.example/{id}.jpg")),
		gallery_image_urls: Vec::new(),
		features: StructuralFeatures { porch: true, ..Default::default() },
	}
}

fn app() -> axum::Router {
	let pool = StaticCandidatePool::new(vec![listing("near", 40.0), listing("mid", 320.0)]);
	let service = FacadeService::new(test_config(), Arc::new(pool), Arc::new(DigestScorer));

	routes::router(AppState::from_service(service))
}

fn multipart_body(photo: Option<&[u8]>, fields: &[(&str, &str)]) -> Vec<u8> {
	let mut body = Vec::new();

	for (name, value) in fields {
		body.extend_from_slice(
			format!(
				"--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
			)
			.as_bytes(),
		);
	}
	if let Some(photo) = photo {
		body.extend_from_slice(
			format!(
				"--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; \
				 filename=\"facade.png\"\r\nContent-Type: image/png\r\n\r\n"
			)
			.as_bytes(),
		);
		body.extend_from_slice(photo);
		body.extend_from_slice(b"\r\n");
	}

	body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

	body
}

fn match_request(body: Vec<u8>) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/v1/match")
		.header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
		.body(Body::from(body))
		.expect("Failed to build request.")
}

fn expand_request(payload: Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/v1/match/expand")
		.header(CONTENT_TYPE, "application/json")
		.body(Body::from(payload.to_string()))
		.expect("Failed to build request.")
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.oneshot(request).await.expect("Failed to call router.");
	let status = response.status();
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");
	let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

	(status, json)
}

fn photo() -> Vec<u8> {
	facade_testkit::facade_png(48, 32, 3).expect("Failed to render facade image.")
}

#[tokio::test]
async fn health_ok() {
	let response = app()
		.oneshot(Request::builder().uri("/health").body(Body::empty()).expect("Bad request."))
		.await
		.expect("Failed to call health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn match_then_expand_round_trip() {
	let app = app();
	let photo = photo();
	let body = multipart_body(
		Some(&photo),
		&[
			("session_id", "s-1"),
			("device_latitude", "43.970837"),
			("device_longitude", "-75.61923"),
			("device_accuracy_m", "25"),
			("hints", "  "),
		],
	);
	let (status, json) = send(app.clone(), match_request(body)).await;

	assert_eq!(status, StatusCode::OK, "Unexpected body: {json}");
	assert_eq!(json["status"], "matches");
	assert_eq!(json["expansion_level"], 0);
	assert_eq!(json["candidate_count"], 1);
	assert_eq!(json["radius_m"], 200.0);
	assert_eq!(json["used_location"]["source"], "device");
	assert_eq!(json["matches"][0]["property_id"], "near");
	assert!(
		json["matches"][0]["reasons"]
			.as_array()
			.expect("reasons must be an array")
			.iter()
			.any(|reason| reason == "front porch visible in listing")
	);

	let token = json["continuation_token"].as_str().expect("Missing continuation token.");
	let (status, json) =
		send(app, expand_request(serde_json::json!({ "continuation_token": token }))).await;

	assert_eq!(status, StatusCode::OK, "Unexpected body: {json}");
	assert_eq!(json["status"], "expanded");
	assert_eq!(json["expansion_level"], 1);
	assert_eq!(json["radius_m"], 450.0);
	assert_eq!(json["candidate_count"], 2);
}

#[tokio::test]
async fn unknown_token_is_not_found() {
	let (status, json) = send(
		app(),
		expand_request(serde_json::json!({ "continuation_token": "does-not-exist", "limit": 3 })),
	)
	.await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(json["error_code"], "session_not_found");
}

#[tokio::test]
async fn missing_location_is_unprocessable() {
	let photo = photo();
	let body = multipart_body(Some(&photo), &[("session_id", "s-1")]);
	let (status, json) = send(app(), match_request(body)).await;

	assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(json["error_code"], "location_unavailable");
}

#[tokio::test]
async fn malformed_numbers_and_missing_photo_are_bad_requests() {
	let photo = photo();
	let bad_number = multipart_body(
		Some(&photo),
		&[("session_id", "s-1"), ("device_latitude", "north-ish"), ("device_longitude", "-75.6")],
	);
	let no_photo = multipart_body(
		None,
		&[
			("session_id", "s-1"),
			("device_latitude", "43.97"),
			("device_longitude", "-75.6"),
			("device_accuracy_m", "10"),
		],
	);
	let (status, json) = send(app(), match_request(bad_number)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "invalid_request");

	let (status, json) = send(app(), match_request(no_photo)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "invalid_request");
}

#[tokio::test]
async fn non_finite_and_out_of_range_numbers_are_bad_requests() {
	let photo = photo();

	for (field, value) in [
		("device_latitude", "NaN"),
		("device_accuracy_m", "inf"),
		("radius_override_m", "-50"),
		("limit", "0"),
	] {
		let mut fields = vec![
			("session_id", "s-1"),
			("device_latitude", "43.970837"),
			("device_longitude", "-75.61923"),
			("device_accuracy_m", "25"),
		];

		fields.retain(|(name, _)| *name != field);
		fields.push((field, value));

		let body = multipart_body(Some(&photo), &fields);
		let (status, json) = send(app(), match_request(body)).await;

		assert_eq!(status, StatusCode::BAD_REQUEST, "{field}={value} must be rejected.");
		assert_eq!(json["error_code"], "invalid_request");
	}
}
