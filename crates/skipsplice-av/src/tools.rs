//! External tool detection.

use std::path::{Path, PathBuf};
use std::process::Command;

use skipsplice_core::{Error, Result};

/// Information about an external tool.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available using the given version argument.
///
/// # Example
///
/// ```no_run
/// use skipsplice_av::check_tool;
///
/// let info = check_tool("ffprobe", "-version");
/// if info.available {
///     println!("ffprobe version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str, version_arg: &str) -> ToolInfo {
    let result = Command::new(name).arg(version_arg).output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path: which::which(name).ok(),
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check every tool the prober shells out to.
pub fn check_tools(ffprobe: &Path) -> Vec<ToolInfo> {
    vec![check_tool(&ffprobe.to_string_lossy(), "-version")]
}

/// Require that a tool is available, returning its path.
///
/// A configured path that exists wins over a `PATH` lookup.
pub fn require_tool(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }

    which::which(name).map_err(|_| Error::tool(name, "not found on PATH"))
}
