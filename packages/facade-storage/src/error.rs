use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("I/O error at {path:?}: {source}")]
	Io { path: PathBuf, source: std::io::Error },
	#[error("Cache file at {path:?} is malformed: {source}")]
	Malformed { path: PathBuf, source: serde_json::Error },
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error("Cache flush failed: {0}")]
	Flush(String),
	#[error("Cache writer is no longer running.")]
	WriterClosed,
}
