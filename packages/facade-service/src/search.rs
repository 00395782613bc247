//! Query and expand: the two entry points that drive a match end to end.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Error, FacadeService, RankedResult, Result, ranking};
use facade_domain::{Location, LocationInput, geo, listing};
use facade_storage::{NewSession, RunMetadata};

#[derive(Clone, Debug)]
pub struct MatchRequest {
	pub session_id: String,
	pub photo: Vec<u8>,
	pub device_location: Option<LocationInput>,
	pub fallback_location: Option<LocationInput>,
	pub radius_override_m: Option<f64>,
	pub limit: Option<f64>,
	pub hints: Option<String>,
	pub user_label: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExpandRequest {
	pub continuation_token: String,
	#[serde(default)]
	pub limit: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
	None,
	Matches,
	Expanded,
}
impl MatchStatus {
	fn for_run(expansion_level: u32, match_count: usize) -> Self {
		match (expansion_level, match_count) {
			(0, 0) => Self::None,
			(0, _) => Self::Matches,
			_ => Self::Expanded,
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchResponse {
	pub matches: Vec<RankedResult>,
	pub candidate_count: usize,
	pub radius_m: f64,
	pub base_radius_m: f64,
	pub expansion_level: u32,
	pub used_location: Location,
	pub status: MatchStatus,
	pub continuation_token: String,
}

struct RunOutcome {
	matches: Vec<RankedResult>,
	candidate_count: usize,
	radius_m: f64,
	base_radius_m: f64,
}

impl FacadeService {
	/// Runs a fresh query at expansion level 0 and opens a session for later expansion.
	pub async fn search(&self, req: MatchRequest) -> Result<MatchResponse> {
		if req.session_id.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "session_id is required.".to_string() });
		}
		if req.photo.is_empty() {
			return Err(Error::InvalidRequest { message: "photo is required.".to_string() });
		}
		if req.photo.len() as u64 > self.cfg.service.max_photo_bytes {
			return Err(Error::InvalidRequest {
				message: format!(
					"photo exceeds the {} byte limit.",
					self.cfg.service.max_photo_bytes
				),
			});
		}

		validate_radius_override(req.radius_override_m)?;
		validate_limit(req.limit)?;

		let location =
			geo::normalize_location(req.device_location.as_ref(), req.fallback_location.as_ref())
				.ok_or_else(no_location)?;
		let photo: Arc<[u8]> = Arc::from(req.photo);
		let outcome = self.run(&photo, location, 0, req.radius_override_m, req.limit).await?;
		let token = self.sessions.create(NewSession {
			session_id: req.session_id,
			photo,
			device_location: req.device_location,
			fallback_location: req.fallback_location,
			radius_override_m: req.radius_override_m,
			limit: req.limit,
			hints: req.hints,
			user_label: req.user_label,
		});

		self.sessions.update_run_metadata(
			&token,
			RunMetadata { location, base_radius_m: outcome.base_radius_m, expansion_level: 0 },
		);

		Ok(respond(outcome, location, 0, token))
	}

	/// Replays a stored session one radius step wider.
	pub async fn expand(&self, req: ExpandRequest) -> Result<MatchResponse> {
		let token = req.continuation_token.trim();

		validate_limit(req.limit)?;

		let session = self
			.sessions
			.get(token)
			.ok_or_else(|| Error::SessionNotFound { token: token.to_string() })?;
		let location = geo::normalize_location(
			session.device_location.as_ref(),
			session.fallback_location.as_ref(),
		)
		.ok_or_else(no_location)?;
		let expansion_level = session.expansion_level.saturating_add(1);
		let limit = req.limit.or(session.limit);
		let outcome = self
			.run(&session.photo, location, expansion_level, session.radius_override_m, limit)
			.await?;

		self.sessions.update_run_metadata(
			token,
			RunMetadata { location, base_radius_m: outcome.base_radius_m, expansion_level },
		);

		Ok(respond(outcome, location, expansion_level, token.to_string()))
	}

	async fn run(
		&self,
		photo: &[u8],
		location: Location,
		expansion_level: u32,
		radius_override_m: Option<f64>,
		limit: Option<f64>,
	) -> Result<RunOutcome> {
		let radius =
			geo::compute_radius(Some(location.accuracy_m), expansion_level, radius_override_m)
				.ok_or_else(no_location)?;
		let candidates = self.pool.find_candidates(Some(&location), radius.radius_m).await?;
		let candidates = listing::dedup_candidates(candidates);
		let candidate_count = candidates.len();
		let scored = self.scorer.score(photo, candidates).await?;
		let limit = ranking::resolve_limit(limit, expansion_level);
		let matches = ranking::rank(scored, radius.radius_m, limit);

		tracing::info!(
			scorer = self.scorer.name(),
			source = location.source.as_str(),
			expansion_level,
			radius_m = radius.radius_m,
			candidate_count,
			matches = matches.len(),
			"Facade query completed."
		);

		Ok(RunOutcome {
			matches,
			candidate_count,
			radius_m: radius.radius_m,
			base_radius_m: radius.base_radius_m,
		})
	}
}

fn respond(
	outcome: RunOutcome,
	used_location: Location,
	expansion_level: u32,
	continuation_token: String,
) -> MatchResponse {
	MatchResponse {
		status: MatchStatus::for_run(expansion_level, outcome.matches.len()),
		matches: outcome.matches,
		candidate_count: outcome.candidate_count,
		radius_m: outcome.radius_m,
		base_radius_m: outcome.base_radius_m,
		expansion_level,
		used_location,
		continuation_token,
	}
}

fn validate_radius_override(radius_override_m: Option<f64>) -> Result<()> {
	match radius_override_m {
		Some(value) if !value.is_finite() || value <= 0.0 => Err(Error::InvalidRequest {
			message: "radius_override_m must be a positive number.".to_string(),
		}),
		_ => Ok(()),
	}
}

fn validate_limit(limit: Option<f64>) -> Result<()> {
	match limit {
		Some(value) if !value.is_finite() || value < 1.0 => Err(Error::InvalidRequest {
			message: "limit must be a number of at least 1.".to_string(),
		}),
		_ => Ok(()),
	}
}

fn no_location() -> Error {
	Error::LocationUnavailable {
		message: "Neither the device nor the fallback location is usable.".to_string(),
	}
}
