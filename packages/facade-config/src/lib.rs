mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, EmbeddingProviderConfig, ImageProviderConfig, ListingProviderConfig, Pool,
	Providers, Scoring, Service,
};

use std::{fs, path::Path};

pub const POOL_SOURCES: [&str; 2] = ["static", "live"];
pub const SCORING_MODES: [&str; 3] = ["phash", "embedding", "digest"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::invalid("service.http_bind", "must be non-empty."));
	}
	if cfg.service.max_photo_bytes == 0 {
		return Err(Error::invalid("service.max_photo_bytes", "must be greater than zero."));
	}
	if !POOL_SOURCES.contains(&cfg.pool.source.as_str()) {
		return Err(Error::invalid("pool.source", "must be one of static or live."));
	}
	if !SCORING_MODES.contains(&cfg.scoring.mode.as_str()) {
		return Err(Error::invalid("scoring.mode", "must be one of phash, embedding, or digest."));
	}
	if cfg.scoring.concurrency == 0 {
		return Err(Error::invalid("scoring.concurrency", "must be greater than zero."));
	}
	if cfg.cache.path.as_os_str().is_empty() {
		return Err(Error::invalid("cache.path", "must be non-empty."));
	}
	if cfg.providers.image.timeout_ms == 0 {
		return Err(Error::invalid("providers.image.timeout_ms", "must be greater than zero."));
	}
	if cfg.providers.image.max_bytes == 0 {
		return Err(Error::invalid("providers.image.max_bytes", "must be greater than zero."));
	}

	match cfg.pool.source.as_str() {
		"static" if cfg.pool.dataset_path.is_none() => {
			return Err(Error::invalid(
				"pool.dataset_path",
				"is required when pool.source is static.",
			));
		},
		"live" => validate_listing(cfg.providers.listing.as_ref())?,
		_ => {},
	}

	if cfg.scoring.mode == "embedding" {
		validate_embedding(cfg.providers.embedding.as_ref())?;
	}

	Ok(())
}

fn validate_listing(listing: Option<&ListingProviderConfig>) -> Result<()> {
	let Some(listing) = listing else {
		return Err(Error::invalid("providers.listing", "is required when pool.source is live."));
	};

	if listing.api_base.trim().is_empty() {
		return Err(Error::invalid("providers.listing.api_base", "must be non-empty."));
	}
	if listing.api_key.trim().is_empty() {
		return Err(Error::invalid("providers.listing.api_key", "must be non-empty."));
	}
	if listing.page_size == 0 {
		return Err(Error::invalid("providers.listing.page_size", "must be greater than zero."));
	}
	if listing.timeout_ms == 0 {
		return Err(Error::invalid("providers.listing.timeout_ms", "must be greater than zero."));
	}

	Ok(())
}

fn validate_embedding(embedding: Option<&EmbeddingProviderConfig>) -> Result<()> {
	let Some(embedding) = embedding else {
		return Err(Error::invalid(
			"providers.embedding",
			"is required when scoring.mode is embedding.",
		));
	};

	if embedding.api_base.trim().is_empty() {
		return Err(Error::invalid("providers.embedding.api_base", "must be non-empty."));
	}
	if embedding.api_key.trim().is_empty() {
		return Err(Error::invalid("providers.embedding.api_key", "must be non-empty."));
	}
	if embedding.model.trim().is_empty() {
		return Err(Error::invalid("providers.embedding.model", "must be non-empty."));
	}
	if embedding.dimensions == 0 {
		return Err(Error::invalid("providers.embedding.dimensions", "must be greater than zero."));
	}
	if embedding.timeout_ms == 0 {
		return Err(Error::invalid("providers.embedding.timeout_ms", "must be greater than zero."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.pool.source = cfg.pool.source.trim().to_ascii_lowercase();
	cfg.scoring.mode = cfg.scoring.mode.trim().to_ascii_lowercase();

	if cfg.pool.dataset_path.as_ref().map(|path| path.as_os_str().is_empty()).unwrap_or(false) {
		cfg.pool.dataset_path = None;
	}
}
