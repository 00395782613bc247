//! Difference hash over a 9x8 grayscale thumbnail.
//!
//! Each of the 8 rows contributes 8 bits, one per adjacent pixel pair, set when the left pixel is
//! brighter than its right neighbour. Bits are laid out row-major with the first comparison in
//! the most significant position, so the hex form reads top-left to bottom-right.

use std::{fmt, str::FromStr};

use image::{GrayImage, imageops::FilterType};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const GRID_WIDTH: u32 = 9;
pub const GRID_HEIGHT: u32 = 8;
pub const FINGERPRINT_BITS: u32 = 64;
pub const FINGERPRINT_HEX_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
	#[error("Image bytes are empty.")]
	Empty,
	#[error("Failed to decode image: {0}")]
	Decode(#[from] image::ImageError),
	#[error("Fingerprint must be {FINGERPRINT_HEX_LEN} hex characters, got {0:?}.")]
	InvalidHex(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);
impl Fingerprint {
	pub fn from_bits(bits: u64) -> Self {
		Self(bits)
	}

	pub fn bits(self) -> u64 {
		self.0
	}

	pub fn to_hex(self) -> String {
		format!("{:016x}", self.0)
	}

	pub fn from_hex(raw: &str) -> Result<Self, FingerprintError> {
		let raw = raw.trim();

		if raw.len() != FINGERPRINT_HEX_LEN || !raw.chars().all(|ch| ch.is_ascii_hexdigit()) {
			return Err(FingerprintError::InvalidHex(raw.to_string()));
		}

		u64::from_str_radix(raw, 16)
			.map(Self)
			.map_err(|_| FingerprintError::InvalidHex(raw.to_string()))
	}

	pub fn distance(self, other: Self) -> u32 {
		(self.0 ^ other.0).count_ones()
	}

	/// 1.0 for identical fingerprints, falling linearly to 0.0 when every bit differs.
	pub fn similarity(self, other: Self) -> f64 {
		1.0 - f64::from(self.distance(other)) / f64::from(FINGERPRINT_BITS)
	}
}

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:016x}", self.0)
	}
}

impl FromStr for Fingerprint {
	type Err = FingerprintError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		Self::from_hex(raw)
	}
}

impl Serialize for Fingerprint {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_hex())
	}
}

impl<'de> Deserialize<'de> for Fingerprint {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Self::from_hex(&raw).map_err(serde::de::Error::custom)
	}
}

pub fn compute(bytes: &[u8]) -> Result<Fingerprint, FingerprintError> {
	if bytes.is_empty() {
		return Err(FingerprintError::Empty);
	}

	let thumbnail = image::load_from_memory(bytes)?
		.resize_exact(GRID_WIDTH, GRID_HEIGHT, FilterType::Triangle)
		.to_luma8();

	Ok(from_grid(&thumbnail))
}

fn from_grid(grid: &GrayImage) -> Fingerprint {
	let mut bits = 0_u64;

	for y in 0..GRID_HEIGHT {
		for x in 0..GRID_WIDTH - 1 {
			let left = grid.get_pixel(x, y).0[0];
			let right = grid.get_pixel(x + 1, y).0[0];

			bits <<= 1;

			if left > right {
				bits |= 1;
			}
		}
	}

	Fingerprint(bits)
}

/// Bit distance between two hex-encoded fingerprints; `None` if either is malformed.
pub fn hamming_hex(a: &str, b: &str) -> Option<u32> {
	let a = Fingerprint::from_hex(a).ok()?;
	let b = Fingerprint::from_hex(b).ok()?;

	Some(a.distance(b))
}
