//! Durable property id → fingerprint index.
//!
//! Records live in memory and are mirrored to a single JSON file. Every [`HashCache::set`]
//! schedules a rewrite of the whole file on one writer task, so writes to the backing file never
//! overlap and requests that pile up while a write is running collapse into a single follow-up
//! write. Reads never wait on the writer.

use std::{
	collections::HashMap,
	io::ErrorKind,
	path::{Path, PathBuf},
	sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::{
	fs,
	sync::{mpsc, oneshot},
};

use crate::{Error, Result};
use facade_domain::Fingerprint;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
	pub property_id: String,
	pub hash: Fingerprint,
	pub source_image_url: String,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

type Index = Arc<RwLock<HashMap<String, FingerprintRecord>>>;

struct FlushRequest {
	ack: Option<oneshot::Sender<Result<(), String>>>,
}

pub struct HashCache {
	path: PathBuf,
	index: Index,
	flush_tx: mpsc::UnboundedSender<FlushRequest>,
}
impl HashCache {
	/// Loads every record from `path` and starts the writer task.
	///
	/// A missing file is an empty cache. A file that cannot be parsed is logged and ignored; it
	/// will be replaced on the next flush.
	pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let records = match load_records(&path).await {
			Ok(records) => records,
			Err(err @ Error::Malformed { .. }) => {
				tracing::warn!(error = %err, "Ignoring unreadable fingerprint cache.");

				Vec::new()
			},
			Err(err) => return Err(err),
		};
		let index: HashMap<_, _> =
			records.into_iter().map(|record| (record.property_id.clone(), record)).collect();

		tracing::info!(path = %path.display(), records = index.len(), "Fingerprint cache loaded.");

		let index = Arc::new(RwLock::new(index));
		let (flush_tx, flush_rx) = mpsc::unbounded_channel();

		tokio::spawn(run_writer(path.clone(), index.clone(), flush_rx));

		Ok(Self { path, index, flush_tx })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn get(&self, property_id: &str) -> Option<FingerprintRecord> {
		self.index.read().unwrap_or_else(|err| err.into_inner()).get(property_id).cloned()
	}

	pub fn len(&self) -> usize {
		self.index.read().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Stores `record` in memory and schedules a background flush.
	pub fn set(&self, record: FingerprintRecord) {
		self.index
			.write()
			.unwrap_or_else(|err| err.into_inner())
			.insert(record.property_id.clone(), record);

		if self.flush_tx.send(FlushRequest { ack: None }).is_err() {
			tracing::error!(path = %self.path.display(), "Fingerprint cache writer has stopped.");
		}
	}

	/// Waits until everything set before this call has been written to disk.
	pub async fn flush(&self) -> Result<()> {
		let (ack_tx, ack_rx) = oneshot::channel();

		self.flush_tx.send(FlushRequest { ack: Some(ack_tx) }).map_err(|_| Error::WriterClosed)?;

		ack_rx.await.map_err(|_| Error::WriterClosed)?.map_err(Error::Flush)
	}
}

async fn load_records(path: &Path) -> Result<Vec<FingerprintRecord>> {
	let raw = match fs::read(path).await {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
		Err(err) => return Err(Error::Io { path: path.to_path_buf(), source: err }),
	};

	if raw.iter().all(u8::is_ascii_whitespace) {
		return Ok(Vec::new());
	}

	serde_json::from_slice(&raw)
		.map_err(|err| Error::Malformed { path: path.to_path_buf(), source: err })
}

async fn run_writer(path: PathBuf, index: Index, mut rx: mpsc::UnboundedReceiver<FlushRequest>) {
	while let Some(first) = rx.recv().await {
		let mut acks: Vec<_> = first.ack.into_iter().collect();

		while let Ok(next) = rx.try_recv() {
			acks.extend(next.ack);
		}

		let snapshot = {
			let guard = index.read().unwrap_or_else(|err| err.into_inner());
			let mut records: Vec<_> = guard.values().cloned().collect();

			records.sort_by(|a, b| a.property_id.cmp(&b.property_id));

			records
		};
		let result = write_snapshot(&path, &snapshot).await.map_err(|err| err.to_string());

		match &result {
			Ok(()) => {
				tracing::debug!(
					path = %path.display(),
					records = snapshot.len(),
					"Fingerprint cache flushed."
				);
			},
			Err(err) => {
				tracing::error!(
					path = %path.display(),
					error = %err,
					"Fingerprint cache flush failed."
				);
			},
		}

		for ack in acks {
			let _ = ack.send(result.clone());
		}
	}
}

async fn write_snapshot(path: &Path, records: &[FingerprintRecord]) -> Result<()> {
	let payload = serde_json::to_vec_pretty(records)?;
	let tmp_path = path.with_extension("tmp");

	if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
		fs::create_dir_all(parent)
			.await
			.map_err(|err| Error::Io { path: parent.to_path_buf(), source: err })?;
	}

	fs::write(&tmp_path, payload)
		.await
		.map_err(|err| Error::Io { path: tmp_path.clone(), source: err })?;
	fs::rename(&tmp_path, path)
		.await
		.map_err(|err| Error::Io { path: path.to_path_buf(), source: err })
}
