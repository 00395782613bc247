use std::time::Duration;

use reqwest::Client;

use crate::{Error, Result};
use facade_config::ImageProviderConfig;

/// Downloads an image, refusing bodies larger than `cfg.max_bytes`.
pub async fn fetch(cfg: &ImageProviderConfig, url: &str) -> Result<Vec<u8>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let mut res = client
		.get(url)
		.headers(crate::default_header_map(&cfg.default_headers)?)
		.send()
		.await?
		.error_for_status()?;

	if let Some(len) = res.content_length()
		&& len > cfg.max_bytes
	{
		return Err(Error::TooLarge { limit: cfg.max_bytes });
	}

	let mut body = Vec::new();

	while let Some(chunk) = res.chunk().await? {
		if (body.len() + chunk.len()) as u64 > cfg.max_bytes {
			return Err(Error::TooLarge { limit: cfg.max_bytes });
		}

		body.extend_from_slice(&chunk);
	}

	if body.is_empty() {
		return Err(Error::InvalidResponse { message: format!("Image at {url} is empty.") });
	}

	Ok(body)
}
