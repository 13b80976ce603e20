//! Platform-specific paths for settings and projects.
//!
//! - **User config**: `~/.config/mixbus/` (Linux),
//!   `~/Library/Application Support/mixbus/` (macOS), `%APPDATA%\mixbus\` (Windows)
//! - **Settings**: `<user config>/settings.toml`
//! - **Projects**: `<user config>/projects/`
//!
//! ```rust,no_run
//! use mixbus_config::paths;
//!
//! if let Some(path) = paths::find_project("demo") {
//!     println!("Found project at: {:?}", path);
//! }
//! ```

use std::path::{Path, PathBuf};

const APP_NAME: &str = "mixbus";

const PROJECTS_SUBDIR: &str = "projects";

const SETTINGS_FILE: &str = "settings.toml";

/// The user configuration directory. Falls back to `./mixbus`.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the user settings file.
pub fn settings_path() -> PathBuf {
    user_config_dir().join(SETTINGS_FILE)
}

/// Directory searched for projects by name.
pub fn user_projects_dir() -> PathBuf {
    user_config_dir().join(PROJECTS_SUBDIR)
}

/// Find a project file.
///
/// `name` may be a path to an existing file, or a project name with or
/// without `.toml` looked up in [`user_projects_dir`].
pub fn find_project(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }
    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{}.toml", name)
    };
    let user_path = user_projects_dir().join(filename);
    user_path.is_file().then_some(user_path)
}

/// Create the user config directory if needed.
pub fn ensure_user_config_dir() -> Result<PathBuf, crate::ConfigError> {
    let dir = user_config_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}

/// Project files in the user projects directory.
pub fn list_user_projects() -> Vec<PathBuf> {
    list_projects_in_dir(&user_projects_dir())
}

/// `.toml` files in `dir`. Empty if the directory is missing or unreadable.
pub fn list_projects_in_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut projects: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    projects.sort();
    projects
}

/// File stem of a project path.
///
/// ```rust
/// use mixbus_config::paths::project_name_from_path;
/// use std::path::Path;
///
/// let name = project_name_from_path(Path::new("/songs/night_drive.toml"));
/// assert_eq!(name.as_deref(), Some("night_drive"));
/// ```
pub fn project_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_dirs_contain_app_name() {
        assert!(user_config_dir().to_string_lossy().contains("mixbus"));
        assert!(settings_path().ends_with("settings.toml"));
        assert!(user_projects_dir().ends_with("projects"));
    }

    #[test]
    fn test_find_project_by_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("song.toml");
        fs::write(&path, "name = \"song\"").unwrap();
        assert_eq!(find_project(path.to_str().unwrap()), Some(path));
    }

    #[test]
    fn test_find_project_not_found() {
        assert!(find_project("nonexistent_project_48151623").is_none());
    }

    #[test]
    fn test_list_projects_in_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.toml"), "").unwrap();
        fs::write(temp_dir.path().join("a.toml"), "").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "").unwrap();

        let projects = list_projects_in_dir(temp_dir.path());
        assert_eq!(projects.len(), 2);
        assert!(projects[0].ends_with("a.toml"));
        assert!(list_projects_in_dir(Path::new("/nonexistent/path/12345")).is_empty());
    }
}
