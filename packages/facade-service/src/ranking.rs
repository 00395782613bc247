//! Fuses visual, geographic, and listing-metadata evidence into one confidence per candidate.

use serde::Serialize;

use crate::ScoredCandidate;
use facade_domain::StructuralFeatures;

pub const VISUAL_WEIGHT: f64 = 0.6;
pub const GEO_WEIGHT: f64 = 0.3;
pub const METADATA_WEIGHT: f64 = 0.1;

pub const MAX_LIMIT: usize = 50;
const DEFAULT_LIMIT: usize = 5;
const DEFAULT_LIMIT_STEP: usize = 5;
const MAX_DEFAULT_LIMIT: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLabel {
	Low,
	Medium,
	High,
	VeryHigh,
}
impl ConfidenceLabel {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Low => "low",
			Self::Medium => "medium",
			Self::High => "high",
			Self::VeryHigh => "very_high",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ComponentScores {
	pub visual: f64,
	pub geo: f64,
	pub metadata: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedResult {
	pub property_id: String,
	pub address_line: String,
	pub preview_image_url: Option<String>,
	pub distance_m: f64,
	pub confidence: f64,
	pub confidence_label: ConfidenceLabel,
	pub reasons: Vec<String>,
	pub scores: ComponentScores,
}

/// 1 at the origin, falling linearly to 0 at 110% of the search radius.
pub fn geo_score(distance_m: f64, radius_m: f64) -> f64 {
	if radius_m <= 0.0 {
		return 0.0;
	}

	(1.0 - distance_m / (radius_m * 1.1)).clamp(0.0, 1.0)
}

pub fn metadata_score(features: &StructuralFeatures) -> f64 {
	let mut score: f64 = 0.5;

	if features.has_gable_roof() {
		score += 0.1;
	}
	if features.porch {
		score += 0.1;
	}
	if features.garage {
		score += 0.05;
	}

	score.clamp(0.0, 1.0)
}

pub fn confidence_label(confidence: f64) -> ConfidenceLabel {
	match confidence {
		c if c >= 0.90 => ConfidenceLabel::VeryHigh,
		c if c >= 0.75 => ConfidenceLabel::High,
		c if c >= 0.55 => ConfidenceLabel::Medium,
		_ => ConfidenceLabel::Low,
	}
}

/// A usable requested limit wins (capped at [`MAX_LIMIT`]); otherwise the default grows with
/// each expansion.
pub fn resolve_limit(requested: Option<f64>, expansion_level: u32) -> usize {
	if let Some(requested) = requested.filter(|value| value.is_finite() && *value >= 1.0) {
		return (requested.floor() as usize).min(MAX_LIMIT);
	}

	let level = usize::try_from(expansion_level).unwrap_or(usize::MAX);
	let step = DEFAULT_LIMIT_STEP.saturating_mul(level);

	DEFAULT_LIMIT.saturating_add(step).min(MAX_DEFAULT_LIMIT)
}

/// Highest confidence first; ties keep their input order.
pub fn rank(scored: Vec<ScoredCandidate>, radius_m: f64, limit: usize) -> Vec<RankedResult> {
	let mut ranked: Vec<RankedResult> =
		scored.into_iter().map(|item| to_result(item, radius_m)).collect();

	ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
	ranked.truncate(limit);

	ranked
}

fn to_result(item: ScoredCandidate, radius_m: f64) -> RankedResult {
	let ScoredCandidate { candidate, similarity, cues } = item;
	let visual = similarity.clamp(0.0, 1.0);
	let geo = geo_score(candidate.distance_m, radius_m);
	let metadata = metadata_score(&candidate.candidate.features);
	let fused = VISUAL_WEIGHT * visual + GEO_WEIGHT * geo + METADATA_WEIGHT * metadata;
	let confidence = round3(fused.clamp(0.0, 1.0));
	let mut reasons = Vec::new();

	if visual > 0.8 {
		reasons.push("strong facade similarity".to_string());
	} else if visual > 0.65 {
		reasons.push("moderate architectural similarity".to_string());
	}
	if geo > 0.7 {
		reasons.push("within immediate proximity".to_string());
	} else if geo > 0.5 {
		reasons.push("nearby according to GPS".to_string());
	}

	for cue in cues {
		if !reasons.contains(&cue) {
			reasons.push(cue);
		}
	}

	let listing = candidate.candidate;

	RankedResult {
		property_id: listing.property_id,
		address_line: listing.address_line,
		preview_image_url: listing.preview_image_url,
		distance_m: candidate.distance_m.round(),
		confidence,
		confidence_label: confidence_label(confidence),
		reasons,
		scores: ComponentScores { visual, geo, metadata },
	}
}

fn round3(value: f64) -> f64 {
	(value * 1_000.0).round() / 1_000.0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn geo_score_decays_to_zero_past_the_radius() {
		assert_eq!(geo_score(0.0, 200.0), 1.0);
		assert_eq!(geo_score(230.0, 200.0), 0.0);
		assert_eq!(geo_score(500.0, 200.0), 0.0);
		assert_eq!(geo_score(10.0, 0.0), 0.0);
		assert!((geo_score(110.0, 200.0) - 0.5).abs() < 1e-9);
	}

	#[test]
	fn labels_follow_thresholds() {
		assert_eq!(confidence_label(0.95), ConfidenceLabel::VeryHigh);
		assert_eq!(confidence_label(0.90), ConfidenceLabel::VeryHigh);
		assert_eq!(confidence_label(0.75), ConfidenceLabel::High);
		assert_eq!(confidence_label(0.55), ConfidenceLabel::Medium);
		assert_eq!(confidence_label(0.549), ConfidenceLabel::Low);
	}

	#[test]
	fn limits_default_by_level_and_honor_requests() {
		assert_eq!(resolve_limit(None, 0), 5);
		assert_eq!(resolve_limit(None, 1), 10);
		assert_eq!(resolve_limit(None, 3), 20);
		assert_eq!(resolve_limit(None, 9), 20);
		assert_eq!(resolve_limit(Some(7.9), 0), 7);
		assert_eq!(resolve_limit(Some(500.0), 0), 50);
		assert_eq!(resolve_limit(Some(0.5), 1), 10);
		assert_eq!(resolve_limit(Some(f64::NAN), 0), 5);
	}

	#[test]
	fn rounds_to_three_decimals() {
		assert_eq!(round3(0.123_456), 0.123);
		assert_eq!(round3(0.999_6), 1.0);
	}
}
