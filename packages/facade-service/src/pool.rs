use std::{path::Path, sync::Arc};

use crate::{BoxFuture, Error, ListingSearch, Result};
use facade_config::ListingProviderConfig;
use facade_domain::{Candidate, CandidateWithDistance, Location, geo};

pub trait CandidatePool
where
	Self: Send + Sync,
{
	/// Candidates within `radius_m` of `location`, nearest first.
	///
	/// Without a location every known candidate is returned at distance zero.
	fn find_candidates<'a>(
		&'a self,
		location: Option<&'a Location>,
		radius_m: f64,
	) -> BoxFuture<'a, Result<Vec<CandidateWithDistance>>>;
}

/// Listings held in memory, loaded once from a JSON array of candidates.
pub struct StaticCandidatePool {
	candidates: Vec<Candidate>,
}
impl StaticCandidatePool {
	pub fn new(candidates: Vec<Candidate>) -> Self {
		Self { candidates }
	}

	pub async fn load(path: &Path) -> Result<Self> {
		let raw = tokio::fs::read(path).await.map_err(|err| Error::Storage {
			message: format!("Failed to read candidate dataset {}: {err}", path.display()),
		})?;
		let candidates: Vec<Candidate> = serde_json::from_slice(&raw).map_err(|err| {
			Error::Storage {
				message: format!("Candidate dataset {} is malformed: {err}", path.display()),
			}
		})?;

		if let Some(index) =
			candidates.iter().position(|candidate| candidate.property_id.trim().is_empty())
		{
			return Err(Error::Storage {
				message: format!(
					"Candidate dataset {} has a blank property_id at index {index}.",
					path.display()
				),
			});
		}

		tracing::info!(
			path = %path.display(),
			candidates = candidates.len(),
			"Candidate dataset loaded."
		);

		Ok(Self::new(candidates))
	}

	pub fn len(&self) -> usize {
		self.candidates.len()
	}

	pub fn is_empty(&self) -> bool {
		self.candidates.is_empty()
	}
}

impl CandidatePool for StaticCandidatePool {
	fn find_candidates<'a>(
		&'a self,
		location: Option<&'a Location>,
		radius_m: f64,
	) -> BoxFuture<'a, Result<Vec<CandidateWithDistance>>> {
		Box::pin(async move { Ok(attach_distances(self.candidates.clone(), location, radius_m)) })
	}
}

/// Radius search against the listing provider on every call.
pub struct LiveCandidatePool {
	cfg: ListingProviderConfig,
	search: Arc<dyn ListingSearch>,
}
impl LiveCandidatePool {
	pub fn new(cfg: ListingProviderConfig, search: Arc<dyn ListingSearch>) -> Self {
		Self { cfg, search }
	}
}

impl CandidatePool for LiveCandidatePool {
	fn find_candidates<'a>(
		&'a self,
		location: Option<&'a Location>,
		radius_m: f64,
	) -> BoxFuture<'a, Result<Vec<CandidateWithDistance>>> {
		Box::pin(async move {
			// The provider cannot search without a center.
			let Some(center) = location else {
				tracing::warn!("Live candidate search skipped without a location.");

				return Ok(Vec::new());
			};
			let candidates = self.search.search(&self.cfg, center.coordinates(), radius_m).await?;

			Ok(attach_distances(candidates, Some(center), radius_m))
		})
	}
}

/// Measures each candidate against `location`, keeps those inside `radius_m` and sorts them by
/// distance. Equal distances keep their input order.
pub fn attach_distances(
	candidates: Vec<Candidate>,
	location: Option<&Location>,
	radius_m: f64,
) -> Vec<CandidateWithDistance> {
	let Some(location) = location else {
		return candidates
			.into_iter()
			.map(|candidate| CandidateWithDistance { candidate, distance_m: 0.0 })
			.collect();
	};
	let origin = location.coordinates();
	let mut within: Vec<_> = candidates
		.into_iter()
		.map(|candidate| {
			let distance_m = geo::distance_m(origin, candidate.coordinates());

			CandidateWithDistance { candidate, distance_m }
		})
		.filter(|item| item.distance_m <= radius_m)
		.collect();

	within.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

	within
}

#[cfg(test)]
mod tests {
	use super::*;
	use facade_domain::{LocationSource, StructuralFeatures};

	fn candidate(id: &str, latitude: f64, longitude: f64) -> Candidate {
		Candidate {
			property_id: id.to_string(),
			address_line: format!("{id} Main Street"),
			latitude,
			longitude,
			preview_image_url: None,
			gallery_image_urls: Vec::new(),
			features: StructuralFeatures::default(),
		}
	}

	fn origin() -> Location {
		Location {
			latitude: 40.0,
			longitude: -75.0,
			accuracy_m: 100.0,
			source: LocationSource::Device,
		}
	}

	#[test]
	fn filters_by_radius_and_sorts_nearest_first() {
		let candidates = vec![
			candidate("far", 40.02, -75.0),
			candidate("mid", 40.001, -75.0),
			candidate("near", 40.0005, -75.0),
		];
		let found = attach_distances(candidates, Some(&origin()), 500.0);
		let ids: Vec<_> = found.iter().map(|item| item.candidate.property_id.as_str()).collect();

		assert_eq!(ids, ["near", "mid"]);
		assert!(found[0].distance_m < found[1].distance_m);
	}

	#[test]
	fn equal_distances_keep_input_order() {
		let candidates = vec![candidate("a", 40.0, -75.0), candidate("b", 40.0, -75.0)];
		let found = attach_distances(candidates, Some(&origin()), 10.0);
		let ids: Vec<_> = found.iter().map(|item| item.candidate.property_id.as_str()).collect();

		assert_eq!(ids, ["a", "b"]);
	}

	#[test]
	fn missing_location_returns_everything_at_zero() {
		let candidates = vec![candidate("a", 10.0, 10.0), candidate("b", -10.0, -10.0)];
		let found = attach_distances(candidates, None, 1.0);

		assert_eq!(found.len(), 2);
		assert!(found.iter().all(|item| item.distance_m == 0.0));
	}
}
