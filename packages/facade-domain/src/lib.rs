pub mod fingerprint;
pub mod geo;
pub mod listing;

pub use fingerprint::{Fingerprint, FingerprintError};
pub use geo::{Coordinates, Location, LocationInput, LocationSource, RadiusComputation};
pub use listing::{Candidate, CandidateWithDistance, StructuralFeatures};
