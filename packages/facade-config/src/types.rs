use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub pool: Pool,
	pub scoring: Scoring,
	pub cache: Cache,
	pub providers: Providers,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Upper bound on the uploaded query photo, in bytes.
	pub max_photo_bytes: u64,
}

#[derive(Debug, Deserialize)]
pub struct Pool {
	/// Either "static" (JSON dataset held in memory) or "live" (listing search provider).
	pub source: String,
	pub dataset_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct Scoring {
	/// One of "phash", "embedding" or "digest".
	pub mode: String,
	/// Upper bound on concurrent per-candidate fingerprint or embedding lookups.
	pub concurrency: usize,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
	pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub image: ImageProviderConfig,
	pub listing: Option<ListingProviderConfig>,
	pub embedding: Option<EmbeddingProviderConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ImageProviderConfig {
	pub timeout_ms: u64,
	pub max_bytes: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ListingProviderConfig {
	pub api_base: String,
	pub path: String,
	pub api_key: String,
	pub page_size: u32,
	#[serde(default = "default_active_only")]
	pub active_only: bool,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub path: String,
	pub api_key: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_active_only() -> bool {
	true
}
