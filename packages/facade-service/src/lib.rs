pub mod fingerprints;
pub mod pool;
pub mod ranking;
pub mod scoring;
pub mod search;

mod error;

pub use error::{Error, Result};
pub use fingerprints::CandidateHashService;
pub use pool::{CandidatePool, LiveCandidatePool, StaticCandidatePool};
pub use ranking::{ComponentScores, ConfidenceLabel, RankedResult};
pub use scoring::{
	DigestScorer, EmbeddingScorer, PerceptualHashScorer, ScoredCandidate, VisualScorer,
};
pub use search::{ExpandRequest, MatchRequest, MatchResponse, MatchStatus};

use std::{future::Future, pin::Pin, sync::Arc};

use facade_config::{Config, EmbeddingProviderConfig, ImageProviderConfig, ListingProviderConfig};
use facade_domain::{Candidate, Coordinates};
use facade_providers::{embedding, image, listing};
use facade_storage::{HashCache, SessionStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ImageFetcher
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		cfg: &'a ImageProviderConfig,
		url: &'a str,
	) -> BoxFuture<'a, facade_providers::Result<Vec<u8>>>;
}

pub trait ListingSearch
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a ListingProviderConfig,
		center: Coordinates,
		radius_m: f64,
	) -> BoxFuture<'a, facade_providers::Result<Vec<Candidate>>>;
}

pub trait ImageEmbedder
where
	Self: Send + Sync,
{
	fn embed_bytes<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		bytes: &'a [u8],
	) -> BoxFuture<'a, facade_providers::Result<Vec<f32>>>;

	fn embed_url<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		url: &'a str,
	) -> BoxFuture<'a, facade_providers::Result<Vec<f32>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub image: Arc<dyn ImageFetcher>,
	pub listing: Arc<dyn ListingSearch>,
	pub embedding: Arc<dyn ImageEmbedder>,
}
impl Providers {
	pub fn new(
		image: Arc<dyn ImageFetcher>,
		listing: Arc<dyn ListingSearch>,
		embedding: Arc<dyn ImageEmbedder>,
	) -> Self {
		Self { image, listing, embedding }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { image: provider.clone(), listing: provider.clone(), embedding: provider }
	}
}

/// One matching service per process. Sessions live in memory for the life of the value.
pub struct FacadeService {
	pub cfg: Config,
	pub pool: Arc<dyn CandidatePool>,
	pub scorer: Arc<dyn VisualScorer>,
	pub sessions: SessionStore,
}
impl FacadeService {
	pub fn new(cfg: Config, pool: Arc<dyn CandidatePool>, scorer: Arc<dyn VisualScorer>) -> Self {
		Self { cfg, pool, scorer, sessions: SessionStore::new() }
	}

	pub async fn from_config(cfg: Config) -> Result<Self> {
		Self::from_config_with_providers(cfg, Providers::default()).await
	}

	/// Builds the pool and scorer named by `cfg.pool.source` and `cfg.scoring.mode`.
	pub async fn from_config_with_providers(cfg: Config, providers: Providers) -> Result<Self> {
		let pool: Arc<dyn CandidatePool> = match cfg.pool.source.as_str() {
			"live" => {
				let listing_cfg = cfg.providers.listing.clone().ok_or_else(|| {
					Error::Configuration {
						message: "providers.listing is required for a live pool.".to_string(),
					}
				})?;

				Arc::new(LiveCandidatePool::new(listing_cfg, providers.listing.clone()))
			},
			_ => {
				let path = cfg.pool.dataset_path.as_deref().ok_or_else(|| Error::Configuration {
					message: "pool.dataset_path is required for a static pool.".to_string(),
				})?;

				Arc::new(StaticCandidatePool::load(path).await?)
			},
		};
		let scorer: Arc<dyn VisualScorer> = match cfg.scoring.mode.as_str() {
			"embedding" => {
				let embedding_cfg = cfg.providers.embedding.clone().ok_or_else(|| {
					Error::Configuration {
						message: "providers.embedding is required for embedding scoring."
							.to_string(),
					}
				})?;

				Arc::new(EmbeddingScorer::new(
					embedding_cfg,
					providers.embedding.clone(),
					cfg.scoring.concurrency,
				))
			},
			"digest" => Arc::new(DigestScorer),
			_ => {
				let cache = HashCache::open(&cfg.cache.path).await?;
				let hashes = CandidateHashService::new(
					cache,
					cfg.providers.image.clone(),
					providers.image.clone(),
				);

				Arc::new(PerceptualHashScorer::new(Arc::new(hashes), cfg.scoring.concurrency))
			},
		};

		tracing::info!(
			pool = cfg.pool.source.as_str(),
			scoring = cfg.scoring.mode.as_str(),
			"Facade service ready."
		);

		Ok(Self::new(cfg, pool, scorer))
	}
}

struct DefaultProviders;

impl ImageFetcher for DefaultProviders {
	fn fetch<'a>(
		&'a self,
		cfg: &'a ImageProviderConfig,
		url: &'a str,
	) -> BoxFuture<'a, facade_providers::Result<Vec<u8>>> {
		Box::pin(image::fetch(cfg, url))
	}
}

impl ListingSearch for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a ListingProviderConfig,
		center: Coordinates,
		radius_m: f64,
	) -> BoxFuture<'a, facade_providers::Result<Vec<Candidate>>> {
		Box::pin(listing::search(cfg, center, radius_m))
	}
}

impl ImageEmbedder for DefaultProviders {
	fn embed_bytes<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		bytes: &'a [u8],
	) -> BoxFuture<'a, facade_providers::Result<Vec<f32>>> {
		Box::pin(embedding::embed_image_bytes(cfg, bytes))
	}

	fn embed_url<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		url: &'a str,
	) -> BoxFuture<'a, facade_providers::Result<Vec<f32>>> {
		Box::pin(embedding::embed_image_url(cfg, url))
	}
}
