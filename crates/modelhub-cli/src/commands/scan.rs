//! `modelhub scan` command implementation

use crate::output::OutputFormat;
use modelhub_kernel::ModelSnapshot;
use modelhub_registry::ArtifactGrouper;
use std::path::Path;

/// Execute the `modelhub scan` command
pub fn run(root: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = ArtifactGrouper::new().scan(root)?;
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());
    let snapshot = ModelSnapshot::from_scan(name, root, 1, outcome);
    super::show::render(&snapshot, true, format)
}
