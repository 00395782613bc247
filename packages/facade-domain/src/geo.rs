use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const MIN_BASE_RADIUS_M: f64 = 200.0;
pub const MAX_BASE_RADIUS_M: f64 = 500.0;
pub const EXPANSION_STEP_M: f64 = 250.0;
pub const MAX_RADIUS_M: f64 = 1_000.0;

/// Device fixes are never trusted below half the smallest search radius.
pub const MIN_DEVICE_ACCURACY_M: f64 = MIN_BASE_RADIUS_M / 2.0;
/// Fallback fixes (IP lookup, manual pin) are assumed to be at least this coarse.
pub const MIN_FALLBACK_ACCURACY_M: f64 = MAX_BASE_RADIUS_M;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
	Device,
	Fallback,
}
impl LocationSource {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Device => "device",
			Self::Fallback => "fallback",
		}
	}
}

/// Location fields as received from a client. Any of them may be absent or garbage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInput {
	pub latitude: Option<f64>,
	pub longitude: Option<f64>,
	pub accuracy_m: Option<f64>,
}
impl LocationInput {
	pub fn new(latitude: f64, longitude: f64, accuracy_m: f64) -> Self {
		Self { latitude: Some(latitude), longitude: Some(longitude), accuracy_m: Some(accuracy_m) }
	}

	fn finite_parts(&self) -> Option<(f64, f64, f64)> {
		let latitude = self.latitude.filter(|value| value.is_finite())?;
		let longitude = self.longitude.filter(|value| value.is_finite())?;
		let accuracy_m = self.accuracy_m.filter(|value| value.is_finite())?;

		Some((latitude, longitude, accuracy_m))
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
	pub latitude: f64,
	pub longitude: f64,
	pub accuracy_m: f64,
	pub source: LocationSource,
}
impl Location {
	pub fn coordinates(&self) -> Coordinates {
		Coordinates { latitude: self.latitude, longitude: self.longitude }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
	pub latitude: f64,
	pub longitude: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadiusComputation {
	pub base_radius_m: f64,
	pub radius_m: f64,
}

pub fn normalize_location(
	device: Option<&LocationInput>,
	fallback: Option<&LocationInput>,
) -> Option<Location> {
	if let Some((latitude, longitude, accuracy_m)) = device.and_then(LocationInput::finite_parts) {
		return Some(Location {
			latitude,
			longitude,
			accuracy_m: accuracy_m.max(MIN_DEVICE_ACCURACY_M),
			source: LocationSource::Device,
		});
	}

	let (latitude, longitude, accuracy_m) = fallback.and_then(LocationInput::finite_parts)?;

	Some(Location {
		latitude,
		longitude,
		accuracy_m: accuracy_m.max(MIN_FALLBACK_ACCURACY_M),
		source: LocationSource::Fallback,
	})
}

pub fn derive_base_radius(accuracy_m: f64) -> f64 {
	(accuracy_m * 2.0).clamp(MIN_BASE_RADIUS_M, MAX_BASE_RADIUS_M)
}

pub fn compute_radius(
	accuracy_m: Option<f64>,
	expansion_level: u32,
	override_m: Option<f64>,
) -> Option<RadiusComputation> {
	let override_m = override_m.filter(|value| value.is_finite() && *value > 0.0);
	let base_radius_m = match override_m {
		Some(value) => value.max(MIN_BASE_RADIUS_M),
		None => derive_base_radius(accuracy_m.filter(|value| value.is_finite() && *value >= 0.0)?),
	};
	let expanded_m = base_radius_m + f64::from(expansion_level) * EXPANSION_STEP_M;
	let radius_m = expanded_m.min(MAX_RADIUS_M);

	Some(RadiusComputation { base_radius_m, radius_m })
}

/// Haversine great-circle distance in meters.
pub fn distance_m(a: Coordinates, b: Coordinates) -> f64 {
	let lat_a = a.latitude.to_radians();
	let lat_b = b.latitude.to_radians();
	let d_lat = (b.latitude - a.latitude).to_radians();
	let d_lon = (b.longitude - a.longitude).to_radians();
	let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

	2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn override_below_floor_is_raised() {
		let radius = compute_radius(None, 0, Some(50.0)).expect("override must be usable");

		assert_eq!(radius.base_radius_m, MIN_BASE_RADIUS_M);
	}

	#[test]
	fn non_positive_override_falls_back_to_accuracy() {
		let radius = compute_radius(Some(150.0), 0, Some(0.0)).expect("accuracy must be usable");

		assert_eq!(radius.base_radius_m, 300.0);
		assert!(compute_radius(None, 0, Some(f64::NAN)).is_none());
	}
}
