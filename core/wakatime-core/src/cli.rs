//! Locating the wakatime-cli binary and deciding when it is usable.
//!
//! Lookup order:
//! 1. `$WAKATIME_CLI_LOCATION`
//! 2. `$WAKATIME_HOME/wakatime-cli-<os>-<arch>` (only if the folder exists)
//! 3. `~/.wakatime/wakatime-cli-<os>-<arch>` (`%APPDATA%\WakaTime` on Windows)

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

const CLI_LOCATION_ENV: &str = "WAKATIME_CLI_LOCATION";
const HOME_ENV: &str = "WAKATIME_HOME";

pub trait CliLocator: Send + Sync {
    /// True once the binary can be invoked.
    fn is_ready(&self) -> bool;
    fn executable_path(&self) -> PathBuf;
}

/// A wakatime-cli binary at a fixed path, ready once the file exists.
///
/// Readiness latches: once seen, the binary is assumed to stay in place.
#[derive(Debug)]
pub struct InstalledCli {
    path: PathBuf,
    ready: AtomicBool,
}

impl InstalledCli {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ready: AtomicBool::new(false),
        }
    }

    /// Resolves the binary location from the environment.
    pub fn discover() -> Option<Self> {
        let cli_override = env::var(CLI_LOCATION_ENV).ok();
        let home_override = env::var(HOME_ENV).ok();
        resolve_cli_path(
            cli_override.as_deref(),
            home_override.as_deref(),
            default_resources_dir(),
        )
        .map(Self::at)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }
}

impl CliLocator for InstalledCli {
    fn is_ready(&self) -> bool {
        if self.ready.load(Ordering::SeqCst) {
            return true;
        }
        if self.path.is_file() {
            self.mark_ready();
            return true;
        }
        false
    }

    fn executable_path(&self) -> PathBuf {
        self.path.clone()
    }
}

pub fn resolve_cli_path(
    cli_override: Option<&str>,
    home_override: Option<&str>,
    default_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = non_blank(cli_override) {
        return Some(PathBuf::from(path));
    }

    let resources = non_blank(home_override)
        .map(PathBuf::from)
        .filter(|dir| dir.is_dir())
        .or(default_dir)?;
    Some(resources.join(binary_name()))
}

/// `wakatime-cli-<os>-<arch>` with `.exe` on Windows.
pub fn binary_name() -> String {
    let ext = if cfg!(windows) { ".exe" } else { "" };
    format!("wakatime-cli-{}-{}{}", platform(), architecture(), ext)
}

pub fn platform() -> &'static str {
    match env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

pub fn architecture() -> &'static str {
    match env::consts::ARCH {
        "x86" => "386",
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    }
}

fn default_resources_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        dirs::config_dir().map(|dir| dir.join("WakaTime"))
    } else {
        dirs::home_dir().map(|home| home.join(".wakatime"))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_location_wins() {
        let resolved = resolve_cli_path(Some("/usr/local/bin/wakatime-cli"), Some("/nope"), None);
        assert_eq!(resolved, Some(PathBuf::from("/usr/local/bin/wakatime-cli")));
    }

    #[test]
    fn wakatime_home_used_only_when_it_exists() {
        let temp = tempfile::tempdir().unwrap();
        let home = temp.path().to_str().unwrap();

        let resolved = resolve_cli_path(None, Some(home), None).unwrap();
        assert_eq!(resolved, temp.path().join(binary_name()));

        let fallback = PathBuf::from("/fallback");
        let resolved = resolve_cli_path(None, Some("/does/not/exist"), Some(fallback.clone()));
        assert_eq!(resolved, Some(fallback.join(binary_name())));
    }

    #[test]
    fn blank_overrides_are_ignored() {
        assert_eq!(resolve_cli_path(Some("  "), Some(""), None), None);
    }

    #[test]
    fn binary_name_uses_cli_naming() {
        let name = binary_name();
        assert!(name.starts_with("wakatime-cli-"));
        assert!(!name.contains("macos"));
        assert!(!name.contains("x86_64"));
    }

    #[test]
    fn readiness_latches_once_binary_exists() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("wakatime-cli");
        let cli = InstalledCli::at(&path);
        assert!(!cli.is_ready());

        fs_err::write(&path, b"#!/bin/sh\n").unwrap();
        assert!(cli.is_ready());

        fs_err::remove_file(&path).unwrap();
        assert!(cli.is_ready());
        assert_eq!(cli.executable_path(), path);
    }
}
