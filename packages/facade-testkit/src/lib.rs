mod error;

pub use error::{Error, Result};

use std::{
	env, fs,
	io::Cursor,
	path::{Path, PathBuf},
};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use uuid::Uuid;

/// Width and height of the thumbnail the difference hash samples.
const GRID: (u32, u32) = (9, 8);
const STEP: u8 = 10;

/// Scratch directory under the system temp dir, removed on drop.
pub struct TestDir {
	path: PathBuf,
	cleaned: bool,
}
impl TestDir {
	pub fn new(prefix: &str) -> Result<Self> {
		let mut path = env::temp_dir();

		path.push(format!("{prefix}_{}", Uuid::new_v4().simple()));

		fs::create_dir_all(&path)
			.map_err(|err| Error::Message(format!("Failed to create test dir {path:?}: {err}.")))?;

		Ok(Self { path, cleaned: false })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn join(&self, name: &str) -> PathBuf {
		self.path.join(name)
	}

	pub fn cleanup(mut self) -> Result<()> {
		self.cleanup_inner()
	}

	fn cleanup_inner(&mut self) -> Result<()> {
		if self.cleaned {
			return Ok(());
		}

		match fs::remove_dir_all(&self.path) {
			Ok(()) => {},
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
			Err(err) => return Err(err.into()),
		}

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for TestDir {
	fn drop(&mut self) {
		if let Err(err) = self.cleanup_inner() {
			eprintln!("Test dir cleanup failed: {err}.");
		}
	}
}

/// PNG whose difference hash is exactly `bits`.
///
/// The image is already at hash resolution, so no resampling blurs the pixel comparisons. Every
/// row starts mid-gray and steps down for a 1 bit and up for a 0 bit.
pub fn fingerprint_png(bits: u64) -> Result<Vec<u8>> {
	let (width, height) = GRID;
	let mut img = RgbImage::new(width, height);

	for y in 0..height {
		let mut level = 128_u8;

		img.put_pixel(0, y, gray(level));

		for x in 1..width {
			let shift = 63 - (y * (width - 1) + (x - 1));

			level = if bits >> shift & 1 == 1 { level - STEP } else { level + STEP };

			img.put_pixel(x, y, gray(level));
		}
	}

	encode_png(img)
}

/// Larger synthetic "facade": horizontal bands of siding, a door and two windows, shifted by
/// `seed` so different seeds produce visibly different images.
pub fn facade_png(width: u32, height: u32, seed: u32) -> Result<Vec<u8>> {
	if width == 0 || height == 0 {
		return Err(Error::Message("Facade image dimensions must be non-zero.".to_string()));
	}

	let offset = seed % width.max(1);
	let img = RgbImage::from_fn(width, height, |x, y| {
		let shifted = (x + offset) % width;
		let in_door = shifted > width * 2 / 5 && shifted < width * 3 / 5 && y > height / 2;
		let in_window = y > height / 5
			&& y < height * 2 / 5
			&& (shifted % (width / 3).max(1)) < (width / 8).max(1);

		if in_door {
			Rgb([60, 40, 30])
		} else if in_window {
			Rgb([30, 40, 70])
		} else {
			let band = ((y * 16 / height) % 2) as u8 * 25;
			let shade = 170_u8.saturating_add(band).saturating_sub((shifted * 40 / width) as u8);

			Rgb([shade, shade, shade.saturating_sub(10)])
		}
	});

	encode_png(img)
}

fn gray(level: u8) -> Rgb<u8> {
	Rgb([level, level, level])
}

fn encode_png(img: RgbImage) -> Result<Vec<u8>> {
	let mut buf = Cursor::new(Vec::new());

	DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Png)?;

	Ok(buf.into_inner())
}
