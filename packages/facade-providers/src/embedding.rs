use std::time::Duration;

use reqwest::{
	Client,
	header::{CONTENT_TYPE, HeaderValue},
};
use serde_json::Value;

use crate::{Error, Result};
use facade_config::EmbeddingProviderConfig;

/// Embeds raw image bytes. The body is sent as-is, with the model named in the query string.
pub async fn embed_image_bytes(cfg: &EmbeddingProviderConfig, bytes: &[u8]) -> Result<Vec<f32>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let dimensions = cfg.dimensions.to_string();
	let res = client
		.post(url)
		.headers(crate::bearer_headers(&cfg.api_key, &cfg.default_headers)?)
		.header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
		.query(&[("model", cfg.model.as_str()), ("dimensions", dimensions.as_str())])
		.body(bytes.to_vec())
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(&json, cfg.dimensions)
}

/// Asks the extractor to download and embed the image at `image_url` itself.
pub async fn embed_image_url(cfg: &EmbeddingProviderConfig, image_url: &str) -> Result<Vec<f32>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"url": image_url,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::bearer_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(&json, cfg.dimensions)
}

fn parse_embedding_response(json: &Value, dimensions: u32) -> Result<Vec<f32>> {
	let embedding = json
		.get("embedding")
		.or_else(|| {
			json.get("data").and_then(|data| data.get(0)).and_then(|item| item.get("embedding"))
		})
		.and_then(Value::as_array)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Embedding response is missing embedding array.".to_string(),
		})?;
	let mut vec = Vec::with_capacity(embedding.len());

	for value in embedding {
		let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
			message: "Embedding value must be numeric.".to_string(),
		})?;

		vec.push(number as f32);
	}

	if vec.len() != dimensions as usize {
		return Err(Error::InvalidResponse {
			message: format!("Embedding has {} dimensions; expected {dimensions}.", vec.len()),
		});
	}

	Ok(vec)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_top_level_and_data_wrapped_embeddings() {
		let top = serde_json::json!({ "embedding": [0.5, -1.0, 2.0] });
		let wrapped =
			serde_json::json!({ "data": [{ "index": 0, "embedding": [0.5, -1.0, 2.0] }] });

		assert_eq!(parse_embedding_response(&top, 3).expect("parse failed"), vec![0.5, -1.0, 2.0]);
		assert_eq!(
			parse_embedding_response(&wrapped, 3).expect("parse failed"),
			vec![0.5, -1.0, 2.0]
		);
	}

	#[test]
	fn rejects_dimension_mismatch() {
		let json = serde_json::json!({ "embedding": [0.1, 0.2] });

		assert!(parse_embedding_response(&json, 3).is_err());
	}

	#[test]
	fn rejects_non_numeric_values() {
		let json = serde_json::json!({ "embedding": [0.1, "x", 0.3] });

		assert!(parse_embedding_response(&json, 3).is_err());
	}
}
