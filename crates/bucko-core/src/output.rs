//! Build metadata files: the published JSON record and the CI props file.

use std::path::{Path, PathBuf};

use bucko_common::constants::{APP_NAME, METADATA_FILE_SUFFIX, PROPS_FILE_NAME};
use bucko_common::error::{BuckoError, Result};
use bucko_common::types::BuildMetadata;

/// Writes `<compose_id>-osbs.json` into a fresh temporary directory.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_metadata_file(compose_id: &str, metadata: &BuildMetadata) -> Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(&format!("{APP_NAME}-"))
        .suffix(".json")
        .tempdir()
        .map_err(|e| BuckoError::io(std::env::temp_dir(), e))?
        .keep();
    let path = dir.join(format!("{compose_id}{METADATA_FILE_SUFFIX}"));
    std::fs::write(&path, metadata.to_json()?).map_err(|e| BuckoError::io(&path, e))?;
    Ok(path)
}

/// Writes `osbs.props` into the CI workspace directory.
///
/// # Errors
///
/// Returns an error if the workspace is not a directory or the file cannot
/// be written.
pub fn write_props_file(workspace: &Path, metadata: &BuildMetadata) -> Result<PathBuf> {
    if !workspace.is_dir() {
        return Err(BuckoError::io(
            workspace,
            std::io::Error::new(std::io::ErrorKind::NotFound, "workspace is not a directory"),
        ));
    }
    let path = workspace.join(PROPS_FILE_NAME);
    std::fs::write(&path, metadata.to_properties()).map_err(|e| BuckoError::io(&path, e))?;
    Ok(path)
}

/// Writes the props file when a workspace is set; failures are only logged.
pub fn emit_props_file(workspace: Option<&Path>, metadata: &BuildMetadata) -> Option<PathBuf> {
    let workspace = workspace?;
    tracing::info!(workspace = %workspace.display(), "workspace detected, writing {PROPS_FILE_NAME}");
    match write_props_file(workspace, metadata) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(error = %e, "skipping props file");
            None
        }
    }
}
