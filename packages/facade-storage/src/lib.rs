pub mod hash_cache;
pub mod sessions;

mod error;

pub use error::Error;
pub use hash_cache::{FingerprintRecord, HashCache};
pub use sessions::{NewSession, RunMetadata, SessionRecord, SessionStore};

pub type Result<T, E = Error> = std::result::Result<T, E>;
