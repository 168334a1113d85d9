//! Test doubles for the registry's collaborators

use modelhub_kernel::{ConversionError, Converter, RegisteredRoot, RegistrationStore, StoreError};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Converter that writes a fixed served model and counts its calls.
pub struct CountingConverter {
    calls: AtomicUsize,
    delay: Duration,
    num_feature: usize,
}

impl CountingConverter {
    pub fn new(num_feature: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            num_feature,
        }
    }

    /// Sleep inside every conversion, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Converter for CountingConverter {
    fn name(&self) -> &str {
        "counting"
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        fs::write(target, crate::tree::served_model(self.num_feature)).map_err(|e| {
            ConversionError::Io {
                path: source.to_path_buf(),
                source: e,
            }
        })
    }
}

/// Converter that always fails, counting its calls.
#[derive(Debug, Default)]
pub struct FailingConverter {
    calls: AtomicUsize,
}

impl FailingConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Converter for FailingConverter {
    fn name(&self) -> &str {
        "failing"
    }

    fn convert(&self, source: &Path, _target: &Path) -> Result<(), ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ConversionError::Failed {
            converter: self.name().to_string(),
            path: source.to_path_buf(),
            message: "unsupported booster version".to_string(),
        })
    }
}

/// Registration store whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingStore;

impl RegistrationStore for FailingStore {
    fn load_registered_roots(&self) -> Result<Vec<RegisteredRoot>, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    fn save_registered_root(&self, _model_name: &str, _root_path: &Path) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    fn delete_registered_root(&self, _model_name: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }
}
