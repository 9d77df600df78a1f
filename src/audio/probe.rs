//! Duration probing via ffprobe.

use std::path::Path;
use std::process::Command;

use crate::engines::exec;

/// Query the container-reported duration of `path` in seconds.
///
/// Returns `None` when ffprobe is not installed or cannot make sense of the
/// file; callers fall back to coarser heuristics in that case.
pub fn probe_duration(path: &Path) -> Option<f64> {
    exec::find_binary("ffprobe")?;

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "csv=p=0"])
        .arg(path.as_os_str())
        .output()
        .ok()?;

    if !output.status.success() {
        log::debug!(
            "ffprobe could not read {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match stdout.trim().parse::<f64>() {
        Ok(duration) => Some(duration),
        Err(_) => {
            log::debug!("ffprobe returned unparsable duration for {}", path.display());
            None
        }
    }
}
