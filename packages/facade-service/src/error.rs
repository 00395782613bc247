pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Location unavailable: {message}")]
	LocationUnavailable { message: String },
	#[error("Session not found: {token}")]
	SessionNotFound { token: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Configuration error: {message}")]
	Configuration { message: String },
}
impl From<facade_providers::Error> for Error {
	fn from(err: facade_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<facade_storage::Error> for Error {
	fn from(err: facade_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
