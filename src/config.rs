use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

/// Tunables for schema inference, pagination and default data discovery.
///
/// Every field has a default, so a partial JSON document (or none at all) is
/// a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page size used when a request does not name one.
    pub default_page_size: usize,
    /// Largest page size a request may ask for; `None` leaves it unbounded.
    pub max_page_size: Option<usize>,
    /// Non-empty values sampled when validating a `bin_prefix` candidate.
    pub bin_sample_size: usize,
    pub bin_min_len: usize,
    pub bin_max_len: usize,
    /// Share of sampled values that must look like a BIN for the candidate
    /// column to be accepted.
    pub bin_min_valid_ratio: f64,
    /// Files tried, in order, by [`crate::state::DatasetStore::load_default`].
    pub default_data_files: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: None,
            bin_sample_size: 50,
            bin_min_len: 6,
            bin_max_len: 8,
            bin_min_valid_ratio: 0.9,
            default_data_files: vec![
                PathBuf::from("bin-list-data-small.csv"),
                PathBuf::from("bin-list-data.csv"),
            ],
        }
    }
}

impl EngineConfig {
    /// Read a JSON configuration file. Missing keys fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| {
            EngineError::malformed(format!("config {}: {e}", path.display()))
        })
    }
}
