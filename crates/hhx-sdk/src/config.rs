//! Repository configuration stored in `.hhx/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use hhx_index::{ScanOptions, IGNORE_FILE};
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// File name of the repository config inside the metadata directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Remote name used when none is given.
pub const DEFAULT_REMOTE: &str = "origin";

/// Per-repository settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Remote used when a command does not name one.
    pub current_remote: String,
    /// Project the repository is linked to, if any.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project: String,
    /// Remote name to URL.
    pub remotes: BTreeMap<String, String>,
    pub scan: ScanConfig,
}

/// `[scan]` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory names scans never descend into, besides hidden directories.
    pub exclude_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: ScanOptions::default().excluded_dirs,
        }
    }
}

impl RepoConfig {
    /// Read the config at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> SdkResult<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw).map_err(|e| SdkError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> SdkResult<()> {
        let raw = toml::to_string_pretty(self).map_err(|e| SdkError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, raw)?;
        Ok(())
    }

    /// Scan options derived from `[scan]`.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            excluded_dirs: self.scan.exclude_dirs.clone(),
            ignore_file: Some(IGNORE_FILE.to_string()),
        }
    }

    /// Register a remote. The first remote becomes current.
    pub fn add_remote(&mut self, name: &str, url: &str) -> SdkResult<()> {
        if self.remotes.contains_key(name) {
            return Err(SdkError::RemoteExists(name.to_string()));
        }
        self.remotes.insert(name.to_string(), url.to_string());
        if self.current_remote.is_empty() {
            self.current_remote = name.to_string();
        }
        Ok(())
    }

    /// Remove a remote, clearing or moving the current one if needed.
    pub fn remove_remote(&mut self, name: &str) -> SdkResult<String> {
        let url = self
            .remotes
            .remove(name)
            .ok_or_else(|| SdkError::UnknownRemote(name.to_string()))?;
        if self.current_remote == name {
            self.current_remote = self.remotes.keys().next().cloned().unwrap_or_default();
        }
        Ok(url)
    }

    /// Resolve `name` (or the current remote) to `(name, url)`.
    pub fn resolve_remote(&self, name: Option<&str>) -> SdkResult<(String, String)> {
        let name = match name {
            Some(n) => n,
            None if self.current_remote.is_empty() => return Err(SdkError::NoRemote),
            None => self.current_remote.as_str(),
        };
        self.remotes
            .get(name)
            .map(|url| (name.to_string(), url.clone()))
            .ok_or_else(|| SdkError::UnknownRemote(name.to_string()))
    }
}
