//! Visual similarity between the query photo and each candidate's listing photo.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{sync::Semaphore, task::JoinSet};

use crate::{BoxFuture, CandidateHashService, Error, ImageEmbedder, Result};
use facade_config::EmbeddingProviderConfig;
use facade_domain::{CandidateWithDistance, StructuralFeatures, fingerprint};

pub const CUE_CLOSE_OUTLINE: &str = "closely matching facade outline";
pub const CUE_SIMILAR_LAYOUT: &str = "similar facade layout";
pub const CUE_PORCH: &str = "front porch visible in listing";
pub const CUE_GARAGE: &str = "garage visible in listing";
pub const CUE_NO_PHOTO: &str = "no listing photo available";
pub const CUE_UNANALYZABLE: &str = "listing photo could not be analyzed";

const CLOSE_OUTLINE_THRESHOLD: f64 = 0.85;
const SIMILAR_LAYOUT_THRESHOLD: f64 = 0.7;

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
	pub candidate: CandidateWithDistance,
	/// In `[0, 1]`.
	pub similarity: f64,
	pub cues: Vec<String>,
}

pub trait VisualScorer
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	/// Scores every candidate, preserving input order.
	///
	/// Only a query photo that cannot be used fails the call; per-candidate failures score zero.
	fn score<'a>(
		&'a self,
		photo: &'a [u8],
		candidates: Vec<CandidateWithDistance>,
	) -> BoxFuture<'a, Result<Vec<ScoredCandidate>>>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Outcome {
	Similarity(f64),
	NoPhoto,
	Unanalyzable,
}

/// Difference-hash comparison against cached or freshly fetched listing fingerprints.
pub struct PerceptualHashScorer {
	hashes: Arc<CandidateHashService>,
	concurrency: usize,
}
impl PerceptualHashScorer {
	pub fn new(hashes: Arc<CandidateHashService>, concurrency: usize) -> Self {
		Self { hashes, concurrency }
	}
}

impl VisualScorer for PerceptualHashScorer {
	fn name(&self) -> &'static str {
		"phash"
	}

	fn score<'a>(
		&'a self,
		photo: &'a [u8],
		candidates: Vec<CandidateWithDistance>,
	) -> BoxFuture<'a, Result<Vec<ScoredCandidate>>> {
		Box::pin(async move {
			let query = fingerprint::compute(photo).map_err(undecodable_query)?;
			let jobs = candidates.iter().map(|item| {
				let hashes = self.hashes.clone();
				let candidate = item.candidate.clone();

				async move {
					match hashes.get_hash(&candidate).await {
						Some(hash) => Outcome::Similarity(query.similarity(hash)),
						None if candidate.primary_image_url().is_none() => Outcome::NoPhoto,
						None => Outcome::Unanalyzable,
					}
				}
			});
			let outcomes = run_bounded(self.concurrency, jobs).await;

			Ok(assemble(candidates, outcomes))
		})
	}
}

/// Cosine similarity of extractor embeddings, rescaled from `[-1, 1]` to `[0, 1]`.
pub struct EmbeddingScorer {
	cfg: Arc<EmbeddingProviderConfig>,
	embedder: Arc<dyn ImageEmbedder>,
	concurrency: usize,
}
impl EmbeddingScorer {
	pub fn new(
		cfg: EmbeddingProviderConfig,
		embedder: Arc<dyn ImageEmbedder>,
		concurrency: usize,
	) -> Self {
		Self { cfg: Arc::new(cfg), embedder, concurrency }
	}
}

impl VisualScorer for EmbeddingScorer {
	fn name(&self) -> &'static str {
		"embedding"
	}

	fn score<'a>(
		&'a self,
		photo: &'a [u8],
		candidates: Vec<CandidateWithDistance>,
	) -> BoxFuture<'a, Result<Vec<ScoredCandidate>>> {
		Box::pin(async move {
			fingerprint::compute(photo).map_err(undecodable_query)?;

			let query = Arc::new(self.embedder.embed_bytes(&self.cfg, photo).await?);
			let timeout = Duration::from_millis(self.cfg.timeout_ms);
			let jobs = candidates.iter().map(|item| {
				let cfg = self.cfg.clone();
				let embedder = self.embedder.clone();
				let query = query.clone();
				let property_id = item.candidate.property_id.clone();
				let url = item.candidate.primary_image_url().map(str::to_string);

				async move {
					let Some(url) = url else {
						return Outcome::NoPhoto;
					};

					match tokio::time::timeout(timeout, embedder.embed_url(&cfg, &url)).await {
						Ok(Ok(vector)) => cosine(&query, &vector)
							.map(|cos| Outcome::Similarity(((cos + 1.0) / 2.0).clamp(0.0, 1.0)))
							.unwrap_or(Outcome::Unanalyzable),
						Ok(Err(err)) => {
							tracing::warn!(
								error = %err,
								property_id = property_id.as_str(),
								"Listing photo embedding failed."
							);

							Outcome::Unanalyzable
						},
						Err(_) => {
							tracing::warn!(
								property_id = property_id.as_str(),
								"Listing photo embedding timed out."
							);

							Outcome::Unanalyzable
						},
					}
				}
			});
			let outcomes = run_bounded(self.concurrency, jobs).await;

			Ok(assemble(candidates, outcomes))
		})
	}
}

/// Deterministic stand-in for a real visual model: a keyed digest of the photo and property id.
pub struct DigestScorer;

impl VisualScorer for DigestScorer {
	fn name(&self) -> &'static str {
		"digest"
	}

	fn score<'a>(
		&'a self,
		photo: &'a [u8],
		candidates: Vec<CandidateWithDistance>,
	) -> BoxFuture<'a, Result<Vec<ScoredCandidate>>> {
		Box::pin(async move {
			if photo.is_empty() {
				return Err(Error::InvalidRequest { message: "Query photo is empty.".to_string() });
			}

			let outcomes = candidates
				.iter()
				.map(|item| digest_similarity(photo, &item.candidate.property_id))
				.map(|similarity| Some(Outcome::Similarity(similarity)))
				.collect();

			Ok(assemble(candidates, outcomes))
		})
	}
}

pub fn digest_similarity(photo: &[u8], property_id: &str) -> f64 {
	let mut hasher = blake3::Hasher::new();

	hasher.update(photo);
	hasher.update(property_id.as_bytes());

	let digest = hasher.finalize();
	let mut prefix = [0_u8; 8];

	prefix.copy_from_slice(&digest.as_bytes()[..8]);

	u64::from_be_bytes(prefix) as f64 / u64::MAX as f64
}

/// Rule-based explanations for one candidate, without duplicates.
pub fn build_cues(similarity: Option<f64>, features: &StructuralFeatures) -> Vec<String> {
	let mut cues = Vec::new();

	match similarity {
		Some(value) if value >= CLOSE_OUTLINE_THRESHOLD => cues.push(CUE_CLOSE_OUTLINE),
		Some(value) if value >= SIMILAR_LAYOUT_THRESHOLD => cues.push(CUE_SIMILAR_LAYOUT),
		_ => {},
	}

	if features.porch {
		cues.push(CUE_PORCH);
	}
	if features.garage {
		cues.push(CUE_GARAGE);
	}

	let mut out: Vec<String> = Vec::with_capacity(cues.len());

	for cue in cues {
		if !out.iter().any(|existing| existing == cue) {
			out.push(cue.to_string());
		}
	}

	out
}

fn assemble(
	candidates: Vec<CandidateWithDistance>,
	outcomes: Vec<Option<Outcome>>,
) -> Vec<ScoredCandidate> {
	candidates
		.into_iter()
		.zip(outcomes)
		.map(|(candidate, outcome)| {
			let outcome = outcome.unwrap_or(Outcome::Unanalyzable);
			let similarity = match outcome {
				Outcome::Similarity(value) => Some(value.clamp(0.0, 1.0)),
				Outcome::NoPhoto | Outcome::Unanalyzable => None,
			};
			let mut cues = build_cues(similarity, &candidate.candidate.features);

			match outcome {
				Outcome::NoPhoto => cues.insert(0, CUE_NO_PHOTO.to_string()),
				Outcome::Unanalyzable => cues.insert(0, CUE_UNANALYZABLE.to_string()),
				Outcome::Similarity(_) => {},
			}

			ScoredCandidate { candidate, similarity: similarity.unwrap_or(0.0), cues }
		})
		.collect()
}

/// Runs `jobs` with at most `limit` in flight. Results keep the order of `jobs`; a job that
/// panicked yields `None`.
async fn run_bounded<I, F, T>(limit: usize, jobs: I) -> Vec<Option<T>>
where
	I: IntoIterator<Item = F>,
	F: Future<Output = T> + Send + 'static,
	T: Send + 'static,
{
	let semaphore = Arc::new(Semaphore::new(limit.max(1)));
	let mut set = JoinSet::new();
	let mut results = Vec::new();

	for (index, job) in jobs.into_iter().enumerate() {
		let semaphore = semaphore.clone();

		results.push(None);
		set.spawn(async move {
			let _permit = semaphore.acquire_owned().await;

			(index, job.await)
		});
	}

	while let Some(joined) = set.join_next().await {
		match joined {
			Ok((index, value)) => results[index] = Some(value),
			Err(err) => tracing::error!(error = %err, "Scoring task failed."),
		}
	}

	results
}

fn cosine(a: &[f32], b: &[f32]) -> Option<f64> {
	if a.len() != b.len() || a.is_empty() {
		return None;
	}

	let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);

	for (x, y) in a.iter().zip(b) {
		let (x, y) = (f64::from(*x), f64::from(*y));

		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return None;
	}

	Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

fn undecodable_query(err: fingerprint::FingerprintError) -> Error {
	Error::InvalidRequest { message: format!("Query photo could not be decoded: {err}") }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn similarity_thresholds_pick_one_visual_cue() {
		let features = StructuralFeatures::default();

		assert_eq!(build_cues(Some(0.9), &features), [CUE_CLOSE_OUTLINE]);
		assert_eq!(build_cues(Some(0.85), &features), [CUE_CLOSE_OUTLINE]);
		assert_eq!(build_cues(Some(0.7), &features), [CUE_SIMILAR_LAYOUT]);
		assert!(build_cues(Some(0.69), &features).is_empty());
		assert!(build_cues(None, &features).is_empty());
	}

	#[test]
	fn feature_cues_follow_visual_cue() {
		let features = StructuralFeatures { porch: true, garage: true, ..Default::default() };

		assert_eq!(build_cues(Some(0.75), &features), [CUE_SIMILAR_LAYOUT, CUE_PORCH, CUE_GARAGE]);
	}

	#[test]
	fn digest_similarity_is_stable_and_bounded() {
		let a = digest_similarity(b"photo", "p-1");

		assert_eq!(a, digest_similarity(b"photo", "p-1"));
		assert_ne!(a, digest_similarity(b"photo", "p-2"));
		assert!((0.0..=1.0).contains(&a));
	}

	#[test]
	fn cosine_handles_degenerate_vectors() {
		assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
		assert_eq!(cosine(&[1.0, 0.0], &[-1.0, 0.0]), Some(-1.0));
		assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), None);
		assert_eq!(cosine(&[1.0], &[1.0, 0.0]), None);
	}

	#[tokio::test]
	async fn bounded_runner_preserves_order() {
		let jobs = (0..10_u64).map(|i| async move {
			tokio::time::sleep(Duration::from_millis(10 - i)).await;

			i
		});
		let results = run_bounded(3, jobs).await;

		assert_eq!(results, (0..10).map(Some).collect::<Vec<_>>());
	}
}
