//! Candidate fingerprints: cache first, then one shared download per property id.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
	time::Duration,
};

use time::OffsetDateTime;
use tokio::sync::OnceCell;

use crate::ImageFetcher;
use facade_config::ImageProviderConfig;
use facade_domain::{Candidate, Fingerprint, fingerprint};
use facade_storage::{FingerprintRecord, HashCache};

type InFlight = Mutex<HashMap<String, Arc<OnceCell<Option<Fingerprint>>>>>;

pub struct CandidateHashService {
	cache: HashCache,
	image_cfg: ImageProviderConfig,
	fetcher: Arc<dyn ImageFetcher>,
	in_flight: InFlight,
}
impl CandidateHashService {
	pub fn new(
		cache: HashCache,
		image_cfg: ImageProviderConfig,
		fetcher: Arc<dyn ImageFetcher>,
	) -> Self {
		Self { cache, image_cfg, fetcher, in_flight: Mutex::new(HashMap::new()) }
	}

	pub fn cache(&self) -> &HashCache {
		&self.cache
	}

	/// Returns the candidate's fingerprint, or `None` when it cannot be produced.
	///
	/// Concurrent callers for the same uncached property id share a single download.
	pub async fn get_hash(&self, candidate: &Candidate) -> Option<Fingerprint> {
		let property_id = candidate.property_id.as_str();

		// Blank ids cannot key the cache without aliasing unrelated listings.
		if property_id.trim().is_empty() {
			return self.fetch_hash(candidate).await.map(|(hash, _)| hash);
		}
		if let Some(record) = self.cache.get(property_id) {
			return Some(record.hash);
		}

		let cell = {
			let mut in_flight = self.in_flight.lock().unwrap_or_else(|err| err.into_inner());

			// A fetch may have finished between the first lookup and taking the lock.
			if let Some(record) = self.cache.get(property_id) {
				return Some(record.hash);
			}

			in_flight.entry(property_id.to_string()).or_default().clone()
		};
		let hash = *cell.get_or_init(|| self.fetch_and_store(candidate)).await;

		{
			let mut in_flight = self.in_flight.lock().unwrap_or_else(|err| err.into_inner());

			if in_flight.get(property_id).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
				in_flight.remove(property_id);
			}
		}

		hash
	}

	async fn fetch_and_store(&self, candidate: &Candidate) -> Option<Fingerprint> {
		let (hash, url) = self.fetch_hash(candidate).await?;

		self.cache.set(FingerprintRecord {
			property_id: candidate.property_id.clone(),
			hash,
			source_image_url: url.to_string(),
			updated_at: OffsetDateTime::now_utc(),
		});

		Some(hash)
	}

	async fn fetch_hash<'a>(&self, candidate: &'a Candidate) -> Option<(Fingerprint, &'a str)> {
		let property_id = candidate.property_id.as_str();
		let Some(url) = candidate.primary_image_url() else {
			tracing::debug!(property_id, "Candidate has no listing photo.");

			return None;
		};
		let timeout = Duration::from_millis(self.image_cfg.timeout_ms);
		let bytes = match tokio::time::timeout(timeout, self.fetcher.fetch(&self.image_cfg, url))
			.await
		{
			Ok(Ok(bytes)) => bytes,
			Ok(Err(err)) => {
				tracing::warn!(error = %err, property_id, url, "Listing photo fetch failed.");

				return None;
			},
			Err(_) => {
				tracing::warn!(property_id, url, "Listing photo fetch timed out.");

				return None;
			},
		};

		match tokio::task::spawn_blocking(move || fingerprint::compute(&bytes)).await {
			Ok(Ok(hash)) => Some((hash, url)),
			Ok(Err(err)) => {
				tracing::warn!(
					error = %err,
					property_id,
					url,
					"Listing photo could not be decoded."
				);

				None
			},
			Err(err) => {
				tracing::error!(error = %err, property_id, url, "Fingerprint task failed.");

				None
			},
		}
	}
}
