//! modelhub testing utilities
//!
//! Artifact-tree fixtures and test doubles for exercising the registry,
//! watcher and conversion cache against real files in temp directories.

pub mod doubles;
pub mod tree;

pub use doubles::{CountingConverter, FailingConverter, FailingStore};
pub use tree::ArtifactTree;

/// Asserts that a snapshot carries a warning containing `$needle`.
#[macro_export]
macro_rules! assert_warning {
    ($snapshot:expr, $needle:expr) => {
        let warnings = $snapshot.warnings();
        assert!(
            warnings.iter().any(|w| w.to_string().contains($needle)),
            "no warning containing {:?} in {:?}",
            $needle,
            warnings
        );
    };
}
