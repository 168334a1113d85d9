//! On-disk artifact fixtures

use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Default factor names written for complete groups.
pub const FACTORS: [&str; 3] = ["f_momentum", "f_spread", "f_volume"];

/// A model root inside a temp directory.
///
/// The root is a subdirectory so tests can delete and recreate it.
pub struct ArtifactTree {
    dir: TempDir,
    root: PathBuf,
}

impl ArtifactTree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = dir.path().join("models");
        fs::create_dir(&root).expect("create model root");
        Self { dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory outside the root, for caches and stores.
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes a complete group: factor list, IC table, info blob, raw and
    /// served model.
    pub fn add_group(&self, group_key: &str) -> &Self {
        self.add_group_with(group_key, &FACTORS)
    }

    pub fn add_group_with(&self, group_key: &str, factors: &[&str]) -> &Self {
        self.add_parsed(group_key, factors);
        self.write(&format!("{group_key}_model.pkl"), b"\x80\x04N.");
        self.write(
            &format!("{group_key}_model.json"),
            served_model(factors.len()).as_bytes(),
        );
        self
    }

    /// Complete group except that only the raw model exists.
    pub fn add_raw_only_group(&self, group_key: &str) -> &Self {
        self.add_parsed(group_key, &FACTORS);
        self.write(&format!("{group_key}_model.pkl"), b"\x80\x04N.");
        self
    }

    /// Writes `bytes` at `relative` under the root, creating parents.
    pub fn write(&self, relative: &str, bytes: &[u8]) -> &Self {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, bytes).expect("write artifact");
        self
    }

    /// Appends a byte so both size and mtime change.
    pub fn touch(&self, relative: &str) -> &Self {
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.root.join(relative))
            .expect("open artifact");
        file.write_all(b"\n").expect("append");
        self
    }

    /// Removes every file belonging to `group_key`.
    pub fn remove_group(&self, group_key: &str) -> &Self {
        for entry in fs::read_dir(&self.root).expect("read root") {
            let path = entry.expect("dir entry").path();
            let belongs = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&format!("{group_key}_")));
            if belongs {
                fs::remove_file(path).expect("remove artifact");
            }
        }
        self
    }

    pub fn remove_root(&self) {
        fs::remove_dir_all(&self.root).expect("remove root");
    }

    fn add_parsed(&self, group_key: &str, factors: &[&str]) {
        let (symbol, return_name) = group_key.split_once('_').unwrap_or((group_key, ""));

        self.write(&format!("{group_key}_factors.txt"), factors.join("\n").as_bytes());

        let mut ic = String::from("symbol,factor_name,return_name,Kendall_tau\n");
        for (i, factor) in factors.iter().enumerate() {
            ic.push_str(&format!("{symbol},{factor},{return_name},{:.2}\n", 0.1 * (i + 1) as f64));
        }
        self.write(&format!("{group_key}_ic.csv"), ic.as_bytes());

        let info = json!({
            "symbol": symbol,
            "return_name": return_name,
            "train_window": [1_700_000_000i64, 1_710_000_000i64],
            "train_samples": 52_000,
            "train_start_date": "2023-11-14",
            "train_end_date": "2024-03-09",
            "selected_factors": factors,
        });
        let blob = serde_pickle::to_vec(&info, serde_pickle::SerOptions::new()).expect("pickle info");
        self.write(&format!("{group_key}_info.pkl"), &blob);
    }
}

impl Default for ArtifactTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal XGBoost-style JSON model.
pub fn served_model(num_feature: usize) -> String {
    json!({
        "version": [2, 0, 3],
        "learner": {
            "learner_model_param": {"num_feature": num_feature.to_string()},
            "objective": {"name": "reg:squarederror"},
            "gradient_booster": {"model": {"gbtree_model_param": {"num_trees": "100"}}},
        }
    })
    .to_string()
}
