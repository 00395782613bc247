use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralFeatures {
	#[serde(default)]
	pub property_type: Option<String>,
	#[serde(default)]
	pub stories: Option<f64>,
	#[serde(default)]
	pub garage: bool,
	#[serde(default)]
	pub roof_style: Option<String>,
	#[serde(default)]
	pub porch: bool,
}
impl StructuralFeatures {
	pub fn has_gable_roof(&self) -> bool {
		self.roof_style.as_deref().is_some_and(|style| style.trim().eq_ignore_ascii_case("gable"))
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
	pub property_id: String,
	#[serde(default)]
	pub address_line: String,
	pub latitude: f64,
	pub longitude: f64,
	#[serde(default)]
	pub preview_image_url: Option<String>,
	#[serde(default)]
	pub gallery_image_urls: Vec<String>,
	#[serde(default)]
	pub features: StructuralFeatures,
}
impl Candidate {
	pub fn coordinates(&self) -> Coordinates {
		Coordinates { latitude: self.latitude, longitude: self.longitude }
	}

	/// Preview image if present, otherwise the first gallery image.
	pub fn primary_image_url(&self) -> Option<&str> {
		let usable = |url: &&str| !url.trim().is_empty();

		self.preview_image_url
			.as_deref()
			.filter(usable)
			.or_else(|| self.gallery_image_urls.iter().map(String::as_str).find(usable))
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateWithDistance {
	pub candidate: Candidate,
	pub distance_m: f64,
}

/// Identity used to collapse the same house listed more than once.
///
/// The street part of the address (text before the first comma, case-folded) wins; listings
/// without an address fall back to the property id, then the image URL.
pub fn dedup_key(candidate: &Candidate) -> String {
	let street = candidate.address_line.split(',').next().unwrap_or_default().trim().to_lowercase();

	if !street.is_empty() {
		return format!("addr:{street}");
	}
	if !candidate.property_id.trim().is_empty() {
		return format!("id:{}", candidate.property_id.trim());
	}

	format!("img:{}", candidate.primary_image_url().unwrap_or_default())
}

/// Keeps the first occurrence of each [`dedup_key`], preserving input order.
pub fn dedup_candidates(candidates: Vec<CandidateWithDistance>) -> Vec<CandidateWithDistance> {
	let mut seen = HashSet::new();

	candidates.into_iter().filter(|item| seen.insert(dedup_key(&item.candidate))).collect()
}
