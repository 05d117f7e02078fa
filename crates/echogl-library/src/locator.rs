//! Steam library discovery

use crate::LibraryError;
use crate::manifest::{normalize_library_path, read_library_folders};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const STEAMAPPS: &str = "steamapps";
const LIBRARY_FOLDERS: &str = "libraryfolders.vdf";

/// A `steamapps` directory holding app manifests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRoot {
    path: PathBuf,
}

impl LibraryRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `appmanifest_*.acf` files in this root, sorted by file name
    pub fn manifests(&self) -> Result<Vec<PathBuf>, LibraryError> {
        let entries = std::fs::read_dir(&self.path).map_err(|source| LibraryError::Discovery {
            path: self.path.clone(),
            source,
        })?;

        let mut manifests: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| name.starts_with("appmanifest_") && name.ends_with(".acf"))
            })
            .collect();

        manifests.sort();
        Ok(manifests)
    }
}

/// Finds every Steam library on this machine
#[derive(Debug, Clone, Default)]
pub struct LibraryLocator {
    /// Steam installation directories; the first with a `steamapps` wins
    primary_candidates: Vec<PathBuf>,
    /// Directories that are, or contain, a `steamapps` directory
    common_locations: Vec<PathBuf>,
}

impl LibraryLocator {
    pub fn new(primary_candidates: Vec<PathBuf>, common_locations: Vec<PathBuf>) -> Self {
        Self {
            primary_candidates,
            common_locations,
        }
    }

    /// Locator for the running OS, plus user-configured library directories
    pub fn for_host(extra_library_dirs: &[PathBuf]) -> Self {
        let mut common_locations = host_common_locations();
        common_locations.extend(extra_library_dirs.iter().cloned());

        Self {
            primary_candidates: host_primary_candidates(),
            common_locations,
        }
    }

    /// Deduplicated library roots in discovery order
    pub fn locate(&self) -> Vec<LibraryRoot> {
        let mut roots = Vec::new();
        let mut seen = HashSet::new();
        let mut add = |path: PathBuf| {
            let key = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if seen.insert(key) {
                tracing::debug!("Library root {}", path.display());
                roots.push(LibraryRoot::new(path));
            }
        };

        let primary = self.primary_candidates.iter().find_map(|dir| {
            let steamapps = dir.join(STEAMAPPS);
            steamapps.is_dir().then_some(steamapps)
        });

        match primary {
            Some(steamapps) => {
                tracing::info!("Found primary Steam library {}", steamapps.display());
                let registry = steamapps.join(LIBRARY_FOLDERS);
                add(steamapps);

                if registry.is_file() {
                    for raw in read_library_folders(&registry) {
                        let library = normalize_library_path(&raw);
                        if library.is_dir() {
                            add(library);
                        } else {
                            tracing::debug!("Registered library {} is not present", library.display());
                        }
                    }
                }
            }
            None => tracing::debug!("No primary Steam installation found"),
        }

        for location in &self.common_locations {
            match steamapps_in(location) {
                Some(steamapps) => add(steamapps),
                None => tracing::debug!("No Steam library at {}", location.display()),
            }
        }

        tracing::info!("Located {} Steam library root(s)", roots.len());
        roots
    }
}

/// The `steamapps` directory a location is or contains
fn steamapps_in(location: &Path) -> Option<PathBuf> {
    if !location.is_dir() {
        return None;
    }

    let is_steamapps = location
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case(STEAMAPPS));
    if is_steamapps {
        return Some(location.to_path_buf());
    }

    let nested = location.join(STEAMAPPS);
    nested.is_dir().then_some(nested)
}

/// Extract a string value from `reg query <key> /v <value>` output
pub fn parse_reg_query_output(output: &str, value_name: &str) -> Option<String> {
    output.lines().find_map(|line| {
        ["REG_EXPAND_SZ", "REG_SZ"].iter().find_map(|marker| {
            let idx = line.find(marker)?;
            let name = line[..idx].trim();
            let data = line[idx + marker.len()..].trim();
            (name.eq_ignore_ascii_case(value_name) && !data.is_empty()).then(|| data.to_string())
        })
    })
}

#[cfg(windows)]
fn registry_value(key: &str, value_name: &str) -> Option<PathBuf> {
    let output = std::process::Command::new("reg")
        .args(["query", key, "/v", value_name])
        .output()
        .map_err(|e| tracing::debug!("reg query {} failed: {}", key, e))
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_reg_query_output(&String::from_utf8_lossy(&output.stdout), value_name).map(PathBuf::from)
}

#[cfg(windows)]
fn host_primary_candidates() -> Vec<PathBuf> {
    [
        (r"HKLM\SOFTWARE\WOW6432Node\Valve\Steam", "InstallPath"),
        (r"HKCU\Software\Valve\Steam", "SteamPath"),
    ]
    .iter()
    .filter_map(|(key, value)| registry_value(key, value))
    .collect()
}

#[cfg(target_os = "macos")]
fn host_primary_candidates() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|home| vec![home.join("Library").join("Application Support").join("Steam")])
        .unwrap_or_default()
}

#[cfg(all(unix, not(target_os = "macos")))]
fn host_primary_candidates() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|home| {
            vec![
                home.join(".steam").join("steam"),
                home.join(".local").join("share").join("Steam"),
            ]
        })
        .unwrap_or_default()
}

#[cfg(not(any(windows, unix)))]
fn host_primary_candidates() -> Vec<PathBuf> {
    Vec::new()
}

#[cfg(windows)]
fn host_common_locations() -> Vec<PathBuf> {
    let mut locations = vec![
        PathBuf::from(r"C:\Program Files (x86)\Steam"),
        PathBuf::from(r"C:\Program Files\Steam"),
    ];
    for drive in 'C'..='Z' {
        for dir in ["Steam", "SteamLibrary", r"Games\Steam", "Games"] {
            locations.push(PathBuf::from(format!(r"{}:\{}", drive, dir)));
        }
    }
    locations
}

#[cfg(target_os = "macos")]
fn host_common_locations() -> Vec<PathBuf> {
    vec![PathBuf::from("/Applications/Steam.app/Contents/SteamOS")]
}

#[cfg(all(unix, not(target_os = "macos")))]
fn host_common_locations() -> Vec<PathBuf> {
    ["/opt/steam", "/usr/share/steam", "/mnt", "/media"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

#[cfg(not(any(windows, unix)))]
fn host_common_locations() -> Vec<PathBuf> {
    Vec::new()
}
