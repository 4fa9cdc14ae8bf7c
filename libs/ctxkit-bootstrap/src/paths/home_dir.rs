use std::{
    env, fs,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum HomeDirError {
    #[error("{0} environment variable is not set")]
    EnvMissing(&'static str),
    #[error("home_dir must be an absolute path (after ~ expansion): {0}")]
    AbsoluteRequired(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Variable holding the user's home for `~` expansion.
#[cfg(target_os = "windows")]
const USER_HOME_VARS: &[&str] = &["USERPROFILE", "HOME"];
#[cfg(not(target_os = "windows"))]
const USER_HOME_VARS: &[&str] = &["HOME"];

/// Base for the default home when none is configured.
#[cfg(target_os = "windows")]
const DEFAULT_BASE_VAR: &str = "APPDATA";
#[cfg(not(target_os = "windows"))]
const DEFAULT_BASE_VAR: &str = "HOME";

/// Resolve the host home directory.
///
/// A configured value may start with `~` and must be absolute after
/// expansion. Without one, `<base>/<default_subdir>` is used where base is
/// `%APPDATA%` on Windows and `$HOME` elsewhere. With `create` the directory
/// is created when missing.
pub fn resolve_home_dir(
    config_home: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let path = match config_home {
        Some(raw) => {
            let expanded = expand_tilde(&raw)?;
            if !expanded.is_absolute() {
                return Err(HomeDirError::AbsoluteRequired(
                    expanded.to_string_lossy().into(),
                ));
            }
            expanded
        }
        None => {
            let base = env::var(DEFAULT_BASE_VAR)
                .map_err(|_| HomeDirError::EnvMissing(DEFAULT_BASE_VAR))?;
            Path::new(&base).join(default_subdir)
        }
    };

    if create {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}

fn user_home() -> Result<String, HomeDirError> {
    USER_HOME_VARS
        .iter()
        .find_map(|v| env::var(v).ok())
        .ok_or(HomeDirError::EnvMissing(USER_HOME_VARS[0]))
}

fn expand_tilde(raw: &str) -> Result<PathBuf, HomeDirError> {
    let Some(rest) = raw.strip_prefix('~') else {
        return Ok(PathBuf::from(raw));
    };
    let home = user_home()?;
    let rest = rest.trim_start_matches(['/', '\\']);
    if rest.is_empty() {
        Ok(PathBuf::from(home))
    } else {
        Ok(Path::new(&home).join(rest))
    }
}
