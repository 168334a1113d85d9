//! modelhub kernel
//!
//! Shared vocabulary for the model registry: artifact naming, fingerprints,
//! parsed symbol records, immutable snapshots, the error taxonomy and the
//! traits implemented by external collaborators (registration store,
//! artifact converter).

// artifact naming contract
pub mod artifact;
pub use artifact::{ArtifactFile, ArtifactKind};

// change signatures
pub mod fingerprint;
pub use fingerprint::{Fingerprint, FingerprintDiff, FingerprintMap};

// parsed records
pub mod record;
pub use record::{DimFactor, IcStat, IcTable, ModelMeta, SymbolRecord, TrainingInfo};

// published snapshots
pub mod snapshot;
pub use snapshot::{MAX_DEGRADATIONS, ModelSnapshot, ModelSummary, ScanOutcome};

// error taxonomy
pub mod error;
pub use error::{RegistryError, RegistryResult, ScanWarning};

// registration persistence
pub mod store;
pub use store::{RegisteredRoot, RegistrationStore, StoreError};

// raw -> served conversion
pub mod convert;
pub use convert::{ConversionError, Converter};

#[cfg(feature = "config")]
pub mod config;
