//! Pretty-printed JSON artifacts on disk.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::PipelineError;

/// Write `value` as indented UTF-8 JSON, creating parent directories.
///
/// Non-ASCII text is written as is, not escaped.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let persist_err = |source: io::Error| PipelineError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let text = serde_json::to_string_pretty(value).map_err(|e| persist_err(io::Error::other(e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(persist_err)?;
    }
    fs::write(path, text).map_err(persist_err)?;

    tracing::info!(path = %path.display(), "Wrote JSON artifact");
    Ok(())
}
