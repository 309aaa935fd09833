//! Scanner module for discovering source videos in the input directory.
//!
//! Entries are matched against a glob pattern relative to the scan directory
//! and returned oldest first.

use glob::{MatchOptions, Pattern, PatternError};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Errors that abort discovery.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The input pattern is not a valid glob.
    #[error("Invalid input pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: PatternError,
    },

    /// The scan directory could not be made absolute.
    #[error("Cannot resolve scan directory {}: {source}", .dir.display())]
    ScanDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A source file eligible for processing in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Last modified time of the file.
    pub modified_time: SystemTime,
}

/// `*` and `?` never cross a path separator, as with shell globbing.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Number of path components in the pattern; matches live exactly that deep.
fn pattern_depth(pattern: &str) -> usize {
    Path::new(pattern)
        .components()
        .filter(|c| matches!(c, std::path::Component::Normal(_)))
        .count()
        .max(1)
}

/// Finds every entry under `scan_dir` matching `pattern`.
///
/// This function:
/// - Compiles the pattern (a syntax error aborts discovery)
/// - Walks `scan_dir` to the depth of the pattern, following symlinks
/// - Keeps non-directory entries whose relative path matches
/// - Skips entries whose relative path is not valid UTF-8
/// - Silently drops entries that cannot be stat'ed
/// - Returns candidates sorted oldest first
pub fn discover_candidates(scan_dir: &Path, pattern: &str) -> Result<Vec<Candidate>, ScanError> {
    let pattern = pattern.trim_start_matches("./");
    let compiled = Pattern::new(pattern).map_err(|source| ScanError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let root = std::path::absolute(scan_dir).map_err(|source| ScanError::ScanDir {
        dir: scan_dir.to_path_buf(),
        source,
    })?;

    if !root.is_dir() {
        debug!("Scan directory {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let depth = pattern_depth(pattern);
    let walker = WalkDir::new(&root)
        .min_depth(depth)
        .max_depth(depth)
        .follow_links(true);

    let mut candidates = Vec::new();

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();

        let Ok(relative) = path.strip_prefix(&root) else {
            continue;
        };

        // glob patterns only match UTF-8 paths
        if relative.to_str().is_none() {
            debug!("Skipping non UTF-8 path {}", path.display());
            continue;
        }

        if !compiled.matches_path_with(relative, MATCH_OPTIONS) {
            continue;
        }

        // Re-stat rather than trusting the walk; unreadable entries are dropped
        let Ok(metadata) = std::fs::metadata(path) else {
            continue;
        };
        if metadata.is_dir() {
            continue;
        }
        let Ok(modified_time) = metadata.modified() else {
            continue;
        };

        candidates.push(Candidate {
            path: path.to_path_buf(),
            modified_time,
        });
    }

    sort_candidates(&mut candidates);
    Ok(candidates)
}

/// Stable sort by modification time, oldest first.
///
/// Equal timestamps keep their discovery order.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by_key(|c| c.modified_time);
}
