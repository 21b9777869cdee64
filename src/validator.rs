// ==============================================================================
// validator.rs - Input Argument Validation
// ==============================================================================
// Description: Validates run directories before any sample is processed
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Reject anything that is not an existing directory
pub fn validate_directory(path: &Path, role: &str) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("{} directory {:?} does not exist", role, path))?;

    if !metadata.is_dir() {
        anyhow::bail!("{} path {:?} is not a directory", role, path);
    }

    debug!("{} directory OK: {:?}", role, path);
    Ok(())
}

/// clap value parser for flags that must name an existing directory
pub fn existing_directory(value: &str) -> std::result::Result<std::path::PathBuf, String> {
    let path = std::path::PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("not an existing directory: {}", value))
    }
}
