use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const VIDEOS_DIR: &str = "videos";
pub const EXCLUSIVE_DIR: &str = "exclusive_videos";

/// Upload/listing filter, matched case-insensitively on the extension.
pub const ALLOWED_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mkv", "flv", "mov", "webm", "swf"];

/// Validate a video name with basic rules: it must be a bare file name with
/// an allowed media extension. Applied to uploads, force requests and list
/// entries before they reach any path join.
pub fn is_valid_video_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
        && has_allowed_extension(name)
}

fn has_allowed_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// The two library directories. The normal library feeds automatic
/// rotation; the exclusive library is reachable only through a force-next
/// request.
#[derive(Debug, Clone)]
pub struct VideoLibrary {
    videos_dir: PathBuf,
    exclusive_dir: PathBuf,
}

impl VideoLibrary {
    pub fn new(workspace: &Path) -> Self {
        Self {
            videos_dir: workspace.join(VIDEOS_DIR),
            exclusive_dir: workspace.join(EXCLUSIVE_DIR),
        }
    }

    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    pub fn exclusive_dir(&self) -> &Path {
        &self.exclusive_dir
    }

    pub fn dir_for(&self, exclusive: bool) -> &Path {
        if exclusive {
            &self.exclusive_dir
        } else {
            &self.videos_dir
        }
    }

    /// Names in the normal library, sorted for a stable listing.
    pub fn normal_names(&self) -> Vec<String> {
        list_names(&self.videos_dir)
    }

    /// Names in the exclusive library, sorted for a stable listing.
    pub fn exclusive_names(&self) -> Vec<String> {
        list_names(&self.exclusive_dir)
    }

    /// Resolve a forced name to a playable path: the normal library is
    /// checked first, then the exclusive one. A name present in both plays
    /// from the normal library.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if !is_valid_video_name(name) {
            return None;
        }
        let normal = self.videos_dir.join(name);
        if normal.is_file() {
            return Some(normal);
        }
        let exclusive = self.exclusive_dir.join(name);
        exclusive.is_file().then_some(exclusive)
    }
}

fn list_names(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(?dir, ?error, "Failed to list library directory");
            return Vec::new();
        }
    };

    let mut names = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            if !entry.file_type().ok()?.is_file() {
                return None;
            }
            let name = entry.file_name().into_string().ok()?;
            has_allowed_extension(&name).then_some(name)
        })
        .collect::<Vec<_>>();
    names.sort();
    names
}
