//! Background Library
//!
//! Lists background clips and resolves user-supplied clip and output names
//! to paths inside their directories.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{CoreError, CoreResult};

/// Extensions accepted as background clips (lowercase, no dot)
pub const BACKGROUND_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mov"];

/// One background clip
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundClip {
    /// File name inside the backgrounds directory
    pub file_name: String,
    /// File name without extension
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

fn is_background(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            BACKGROUND_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Lists clips in `dir`, sorted by file name.
///
/// A missing directory is created and yields an empty list.
pub fn list_backgrounds(dir: &Path) -> CoreResult<Vec<BackgroundClip>> {
    std::fs::create_dir_all(dir)?;

    let mut clips = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !is_background(&path) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.clone());
        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);

        clips.push(BackgroundClip {
            file_name,
            name,
            path,
            size_bytes,
        });
    }

    clips.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(clips)
}

/// Keeps only the final path component of a user-supplied name
pub fn safe_file_name(requested: &str) -> Option<String> {
    let normalized = requested.replace('\\', "/");
    let base = normalized.rsplit('/').next()?.trim();
    match base {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

fn resolve_in(dir: &Path, requested: &str, what: &str) -> CoreResult<PathBuf> {
    if requested.trim().is_empty() {
        return Err(CoreError::Validation(format!("{} is required", what)));
    }

    let name = safe_file_name(requested)
        .ok_or_else(|| CoreError::NotFound(format!("{} not found: {}", what, requested)))?;
    let path = dir.join(&name);

    if path.is_file() {
        Ok(path)
    } else {
        Err(CoreError::NotFound(format!("{} not found: {}", what, name)))
    }
}

/// Resolves a background clip name inside `dir`
pub fn resolve_background(dir: &Path, requested: &str) -> CoreResult<PathBuf> {
    resolve_in(dir, requested, "Background video")
}

/// Resolves a rendered output name inside `dir`
pub fn resolve_output(dir: &Path, requested: &str) -> CoreResult<PathBuf> {
    resolve_in(dir, requested, "Output file")
}
