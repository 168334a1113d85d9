//! modelhub registry
//!
//! - [`grouper`]: scans a model root and parses artifact groups into records
//! - [`fingerprint`]: stat/hash change detection against a snapshot baseline
//! - [`registry`]: the copy-on-write model registry
//! - [`watcher`]: per-root polling, debouncing and refresh scheduling
//! - [`conversion`]: single-flight raw-to-served model cache
//! - [`store`]: registration store implementations

pub mod conversion;
pub mod converter;
pub mod fingerprint;
pub mod grouper;
pub mod registry;
pub mod store;
pub mod watcher;

pub use conversion::{ConversionCache, ConversionCacheEntry};
pub use converter::CommandConverter;
pub use fingerprint::{FingerprintIndex, RootState};
pub use grouper::ArtifactGrouper;
pub use registry::{ModelRegistry, ServedModel};
pub use store::{JsonRegistrationStore, MemoryRegistrationStore};
pub use watcher::{ModelWatcher, RootWatch, WatchAction, WatchPhase, WatcherConfig};

pub use modelhub_kernel as kernel;
