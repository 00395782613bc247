//! In-memory query sessions keyed by continuation token.
//!
//! Sessions are never evicted here; lifetime limits belong to whoever owns the store.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use time::OffsetDateTime;
use uuid::Uuid;

use facade_domain::{Location, LocationInput};

/// Everything needed to replay a query at a wider radius.
#[derive(Clone, Debug)]
pub struct NewSession {
	pub session_id: String,
	pub photo: Arc<[u8]>,
	pub device_location: Option<LocationInput>,
	pub fallback_location: Option<LocationInput>,
	pub radius_override_m: Option<f64>,
	pub limit: Option<f64>,
	pub hints: Option<String>,
	pub user_label: Option<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct RunMetadata {
	pub location: Location,
	pub base_radius_m: f64,
	pub expansion_level: u32,
}

#[derive(Clone, Debug)]
pub struct SessionRecord {
	pub token: String,
	pub session_id: String,
	pub photo: Arc<[u8]>,
	pub device_location: Option<LocationInput>,
	pub fallback_location: Option<LocationInput>,
	pub radius_override_m: Option<f64>,
	pub limit: Option<f64>,
	pub hints: Option<String>,
	pub user_label: Option<String>,
	pub expansion_level: u32,
	pub last_location: Option<Location>,
	pub last_base_radius_m: Option<f64>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Default)]
pub struct SessionStore {
	sessions: Mutex<HashMap<String, SessionRecord>>,
}
impl SessionStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn create(&self, session: NewSession) -> String {
		let token = Uuid::new_v4().simple().to_string();
		let now = OffsetDateTime::now_utc();
		let record = SessionRecord {
			token: token.clone(),
			session_id: session.session_id,
			photo: session.photo,
			device_location: session.device_location,
			fallback_location: session.fallback_location,
			radius_override_m: session.radius_override_m,
			limit: session.limit,
			hints: session.hints,
			user_label: session.user_label,
			expansion_level: 0,
			last_location: None,
			last_base_radius_m: None,
			created_at: now,
			updated_at: now,
		};

		self.sessions.lock().unwrap_or_else(|err| err.into_inner()).insert(token.clone(), record);

		token
	}

	pub fn get(&self, token: &str) -> Option<SessionRecord> {
		self.sessions.lock().unwrap_or_else(|err| err.into_inner()).get(token).cloned()
	}

	/// Records the outcome of a run. Returns `false` when the token is unknown.
	///
	/// Concurrent updates for one token are last-writer-wins, except that the stored expansion
	/// level never moves backwards.
	pub fn update_run_metadata(&self, token: &str, run: RunMetadata) -> bool {
		let mut sessions = self.sessions.lock().unwrap_or_else(|err| err.into_inner());
		let Some(record) = sessions.get_mut(token) else {
			return false;
		};

		record.last_location = Some(run.location);
		record.last_base_radius_m = Some(run.base_radius_m);
		record.expansion_level = record.expansion_level.max(run.expansion_level);
		record.updated_at = OffsetDateTime::now_utc();

		true
	}

	pub fn len(&self) -> usize {
		self.sessions.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
