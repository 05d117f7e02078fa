//! Steam manifest extraction
//!
//! Narrow `"key" "value"` extraction from `appmanifest_*.acf` and
//! `libraryfolders.vdf`. Braces are ignored, so one level of nesting reads
//! the same as a flat file.

use crate::{AppId, LibraryError};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// Install path shown for titles whose directory is missing
pub const NOT_FOUND: &str = "N/A - Not Found";

/// Identifying fields of one manifest file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestFields {
    pub app_id: Option<AppId>,
    pub name: Option<String>,
    pub install_dir: Option<String>,
}

/// An installed title, as read during one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameManifest {
    pub app_id: AppId,
    pub name: String,
    pub install_dir: Option<String>,
    /// `<root>/common/<install_dir>` when that directory exists
    pub install_path: Option<PathBuf>,
}

impl GameManifest {
    /// Resolve parsed fields against the library root they came from.
    ///
    /// Returns `None` when the manifest carries no app id.
    pub fn resolve(fields: ManifestFields, steamapps: &Path) -> Option<Self> {
        let app_id = fields.app_id?;

        let install_dir = fields.install_dir.filter(|dir| !dir.is_empty());
        let name = fields
            .name
            .filter(|name| !name.is_empty())
            .or_else(|| install_dir.clone())
            .unwrap_or_else(|| format!("App {}", app_id));

        let install_path = install_dir
            .as_deref()
            .map(|dir| steamapps.join("common").join(dir))
            .filter(|path| path.is_dir());

        Some(Self {
            app_id,
            name,
            install_dir,
            install_path,
        })
    }

    /// Install path as stored, or the not-found sentinel
    pub fn install_path_display(&self) -> String {
        match &self.install_path {
            Some(path) => path.to_string_lossy().into_owned(),
            None => NOT_FOUND.to_string(),
        }
    }
}

/// Quoted strings on one line, unescaped
fn quoted_strings(line: &str) -> Vec<String> {
    let mut strings = Vec::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if c != '"' {
            continue;
        }

        let mut value = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '"' => {
                    closed = true;
                    break;
                }
                '\\' => match chars.next() {
                    Some(escaped @ ('\\' | '"')) => value.push(escaped),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => value.push('\\'),
                },
                _ => value.push(c),
            }
        }

        if !closed {
            break;
        }
        strings.push(value);
    }

    strings
}

/// Every `"key" "value"` pair in document order
fn key_values(text: &str) -> impl Iterator<Item = (String, String)> + '_ {
    text.lines().flat_map(|line| {
        let mut strings = quoted_strings(line).into_iter();
        let mut pairs = Vec::new();
        while let (Some(key), Some(value)) = (strings.next(), strings.next()) {
            pairs.push((key, value));
        }
        pairs
    })
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Extract app id, name and install directory from a manifest
pub fn parse_manifest(text: &str) -> ManifestFields {
    let mut fields = ManifestFields::default();
    let mut seen_app_id = false;

    for (key, value) in key_values(text) {
        if key.eq_ignore_ascii_case("appid") {
            if !seen_app_id {
                seen_app_id = true;
                fields.app_id = value.trim().parse().ok();
            }
        } else if key.eq_ignore_ascii_case("name") {
            fields.name.get_or_insert(value);
        } else if key.eq_ignore_ascii_case("installdir") {
            fields.install_dir.get_or_insert(value);
        }
    }

    fields
}

/// Extract library paths from a library registry file.
///
/// Accepts numbered keys (legacy layout) and `path` keys (current layout).
/// Numeric values under numbered keys are per-app sizes, not paths.
pub fn parse_library_folders(text: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();

    for (key, value) in key_values(text) {
        let is_path = if key.eq_ignore_ascii_case("path") {
            true
        } else {
            is_numeric(&key) && !is_numeric(&value)
        };

        if is_path && !value.is_empty() && !paths.contains(&value) {
            paths.push(value);
        }
    }

    paths
}

fn read_lossy(path: &Path) -> Result<String, LibraryError> {
    let bytes = std::fs::read(path).map_err(|e| LibraryError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read and parse a manifest file; unreadable files yield empty fields
pub fn read_manifest(path: &Path) -> ManifestFields {
    match read_lossy(path) {
        Ok(text) => parse_manifest(&text),
        Err(e) => {
            tracing::warn!("{}", e);
            ManifestFields::default()
        }
    }
}

/// Read and parse a library registry file; unreadable files yield no paths
pub fn read_library_folders(path: &Path) -> Vec<String> {
    match read_lossy(path) {
        Ok(text) => parse_library_folders(&text),
        Err(e) => {
            tracing::warn!("{}", e);
            Vec::new()
        }
    }
}

/// Turn an already unescaped library path into the `steamapps` directory
/// it refers to
pub fn normalize_library_path(raw: &str) -> PathBuf {
    let normalized: String = raw
        .chars()
        .map(|c| if c == '\\' || c == '/' { MAIN_SEPARATOR } else { c })
        .collect();

    PathBuf::from(normalized).join("steamapps")
}
