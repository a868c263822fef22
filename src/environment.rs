use crate::error::Result;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Number of bits in one machine word after wide signals have been lowered.
pub const WORD_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum OptimizationLevel {
    #[serde(rename = "none")]
    Disabled,
    #[serde(rename = "basic")]
    Basic,
    #[serde(rename = "full")]
    Full,
}

impl Default for OptimizationLevel {
    fn default() -> Self {
        Self::Full
    }
}

/// Tunables of the simplification passes. All defaults follow the reference
/// behavior; they are knobs for debugging, not semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    #[serde(rename = "optimization", default)]
    pub optimization_level: OptimizationLevel,
    /// Upper bound on the merged text of adjacent display statements.
    #[serde(default = "default_display_merge_limit")]
    pub display_merge_limit: usize,
    /// Recursion bound when checking whether concatenation halves are
    /// mergeable; caps worst-case cost on deep concatenation trees.
    #[serde(default = "default_concat_merge_depth")]
    pub concat_merge_depth: usize,
    /// Depth bound of the conservative self-reference scan used before
    /// merging adjacent bit-field assignments.
    #[serde(default = "default_var_scan_depth")]
    pub var_scan_depth: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            optimization_level: OptimizationLevel::default(),
            display_merge_limit: default_display_merge_limit(),
            concat_merge_depth: default_concat_merge_depth(),
            var_scan_depth: default_var_scan_depth(),
        }
    }
}

impl Environment {
    pub fn from_file(path: &Path) -> Result<Environment> {
        let file = File::open(path)
            .map_err(|_| format!("Environment file '{}' could not be loaded", path.display()))?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_yaml::to_string(self).unwrap())
    }
}

fn default_display_merge_limit() -> usize {
    500
}

fn default_concat_merge_depth() -> usize {
    10
}

fn default_var_scan_depth() -> usize {
    2
}
