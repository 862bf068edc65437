//! Operations manual loading

use super::normalize::{normalize, prefix_hash};
use crate::error::{TellerError, TellerResult};
use std::path::Path;
use tracing::info;

/// Read and normalize the operations manual.
///
/// A missing or empty manual is an error: the manual is the cached prefix and
/// substituting placeholder text would silently change it.
pub fn load_manual(path: &Path) -> TellerResult<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        TellerError::io_with_path(
            format!("Failed to read operations manual: {}", e),
            path.display().to_string(),
        )
    })?;

    let manual = normalize(&raw);
    if manual.trim().is_empty() {
        return Err(TellerError::config_with_context(
            "Operations manual is empty",
            path.display().to_string(),
        ));
    }

    info!(
        path = %path.display(),
        chars = manual.chars().count(),
        hash = %prefix_hash(&manual),
        "loaded operations manual"
    );
    Ok(manual)
}
