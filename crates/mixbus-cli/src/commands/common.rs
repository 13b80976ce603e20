//! Shared CLI helpers used across multiple commands.

use std::path::{Path, PathBuf};

use mixbus_config::{Project, find_project, user_projects_dir};
use mixbus_engine::Notification;

/// Load a project by path or by name from the user projects directory.
///
/// Returns the project and the directory its relative audio paths resolve
/// against.
pub fn open_project(name: &str) -> anyhow::Result<(Project, PathBuf)> {
    let Some(path) = find_project(name) else {
        anyhow::bail!(
            "Project '{}' not found. Pass a file path or a name from {}",
            name,
            user_projects_dir().display()
        );
    };
    let project = Project::load(&path)?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    tracing::debug!(path = %path.display(), name = %project.name, "project opened");
    Ok((project, base))
}

/// Print engine notifications a user should see.
pub fn report(notifications: impl IntoIterator<Item = Notification>) {
    for notification in notifications {
        match notification {
            Notification::EffectFailed {
                channel,
                index,
                kind,
                reason,
            } => {
                eprintln!(
                    "Warning: effect '{}' (slot {} on {}) failed to load and passes audio through: {}",
                    kind, index, channel, reason
                );
            }
            Notification::DeviceFellBack { reason } => {
                eprintln!("Warning: output device lost ({}); continuing silently", reason);
            }
            _ => {}
        }
    }
}

/// Frames as `m:ss.mmm`.
pub fn format_time(frames: u64, sample_rate: f32) -> String {
    let seconds = frames as f64 / f64::from(sample_rate.max(1.0));
    let minutes = (seconds / 60.0).floor();
    format!("{}:{:06.3}", minutes as u64, seconds - minutes * 60.0)
}

/// Linear peak in dBFS, floored at -120.
pub fn peak_db(peak: f32) -> f32 {
    mixbus_core::linear_to_db(peak.max(1e-6))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0, 48000.0), "0:00.000");
        assert_eq!(format_time(48000 * 75 + 24000, 48000.0), "1:15.500");
    }

    #[test]
    fn test_peak_db_floor() {
        assert!(peak_db(0.0) <= -119.0);
        assert!(peak_db(1.0).abs() < 1e-4);
    }
}
