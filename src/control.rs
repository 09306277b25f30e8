use crate::playlist::OrderingMode;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const MODE_FILE: &str = "shuffle_mode.txt";
pub const CUSTOM_ORDER_FILE: &str = "custom_order.txt";
pub const PRIORITY_FILE: &str = "list_then_random.txt";
pub const FORCE_FILE: &str = "force_next.txt";
pub const NOW_PLAYING_FILE: &str = "now_playing.txt";
pub const PAUSED_FLAG: &str = "paused.flag";

/// Sentinel written to the now-playing marker while the placeholder is on air.
pub const PAUSED_SENTINEL: &str = "PAUSED";

/// What the now-playing marker currently advertises. Display-only: nothing
/// in the playout loop ever reads it back for a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NowPlaying {
    Paused,
    Video(String),
}

impl fmt::Display for NowPlaying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NowPlaying::Paused => f.write_str(PAUSED_SENTINEL),
            NowPlaying::Video(name) => f.write_str(name),
        }
    }
}

/// Typed accessors over the plain-text control files in the shared
/// workspace. Both roles (panel and playout loop) go through this store;
/// an external panel process pointed at the same directory interoperates
/// because the file names and formats are part of the protocol.
///
/// There is no locking. Concurrent writers are last-write-wins and a
/// force-next write racing its consumption is accepted behavior.
#[derive(Debug, Clone)]
pub struct ControlStore {
    root: PathBuf,
}

impl ControlStore {
    pub fn new(workspace: &Path) -> Self {
        Self {
            root: workspace.to_path_buf(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Read a control file, treating a missing file as absent state and an
    /// unreadable one as absent-with-warning. Never fails.
    fn read(&self, name: &str) -> Option<String> {
        match fs::read_to_string(self.path(name)) {
            Ok(content) => Some(content),
            Err(error) if error.kind() == ErrorKind::NotFound => None,
            Err(error) => {
                warn!(file = name, ?error, "Unreadable control file, treating as absent");
                None
            }
        }
    }

    fn write(&self, name: &str, content: &str) {
        if let Err(error) = fs::write(self.path(name), content) {
            warn!(file = name, ?error, "Failed to write control file");
        }
    }

    /// Current ordering mode; unknown or missing tokens normalize to the
    /// default.
    pub fn ordering_mode(&self) -> OrderingMode {
        self.read(MODE_FILE)
            .map(|content| OrderingMode::parse_lossy(content.trim()))
            .unwrap_or_default()
    }

    pub fn set_ordering_mode(&self, mode: OrderingMode) {
        self.write(MODE_FILE, mode.as_str());
    }

    fn read_list(&self, name: &str) -> Vec<String> {
        self.read(name)
            .map(|content| {
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn write_list(&self, name: &str, videos: &[String]) {
        let mut content = videos.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        self.write(name, &content);
    }

    pub fn custom_order(&self) -> Vec<String> {
        self.read_list(CUSTOM_ORDER_FILE)
    }

    pub fn set_custom_order(&self, videos: &[String]) {
        self.write_list(CUSTOM_ORDER_FILE, videos);
    }

    pub fn priority_list(&self) -> Vec<String> {
        self.read_list(PRIORITY_FILE)
    }

    pub fn set_priority_list(&self, videos: &[String]) {
        self.write_list(PRIORITY_FILE, videos);
    }

    /// Whether a force-next request is pending, without consuming it.
    pub fn force_pending(&self) -> bool {
        self.path(FORCE_FILE).exists()
    }

    pub fn set_force_request(&self, video: &str) {
        self.write(FORCE_FILE, video);
    }

    /// Consume a pending force-next request: read the requested name, then
    /// delete the file. Single-use; a second call without a new write finds
    /// nothing. The payload is returned even when it will not resolve to a
    /// file, so the caller can log the skip.
    pub fn take_force_request(&self) -> Option<String> {
        let content = self.read(FORCE_FILE)?;
        if let Err(error) = fs::remove_file(self.path(FORCE_FILE)) {
            if error.kind() != ErrorKind::NotFound {
                warn!(?error, "Failed to remove consumed force request");
            }
        }
        Some(content.trim().to_string())
    }

    pub fn paused(&self) -> bool {
        self.path(PAUSED_FLAG).exists()
    }

    pub fn set_paused(&self, paused: bool) {
        if paused {
            self.write(PAUSED_FLAG, "");
        } else if let Err(error) = fs::remove_file(self.path(PAUSED_FLAG)) {
            if error.kind() != ErrorKind::NotFound {
                warn!(?error, "Failed to remove pause flag");
            }
        }
    }

    /// Raw marker content for the status display.
    pub fn now_playing(&self) -> Option<String> {
        self.read(NOW_PLAYING_FILE)
            .map(|content| content.trim().to_string())
    }

    pub fn set_now_playing(&self, value: &NowPlaying) {
        self.write(NOW_PLAYING_FILE, &value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ControlStore) {
        let dir = TempDir::new().unwrap();
        let store = ControlStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn ordering_mode_defaults_and_round_trips() {
        let (_dir, store) = store();
        assert_eq!(store.ordering_mode(), OrderingMode::Random);

        store.set_ordering_mode(OrderingMode::Alphabetical);
        assert_eq!(store.ordering_mode(), OrderingMode::Alphabetical);

        // Garbage written by hand normalizes to the default
        std::fs::write(_dir.path().join(MODE_FILE), "shuffled\n").unwrap();
        assert_eq!(store.ordering_mode(), OrderingMode::Random);
    }

    #[test]
    fn lists_strip_blank_lines() {
        let (_dir, store) = store();
        assert!(store.priority_list().is_empty());

        std::fs::write(
            _dir.path().join(PRIORITY_FILE),
            "b.mp4\n\n  a.mp4  \n\n",
        )
        .unwrap();
        assert_eq!(store.priority_list(), vec!["b.mp4", "a.mp4"]);
    }

    #[test]
    fn list_write_round_trips() {
        let (_dir, store) = store();
        let videos = vec!["x.mp4".to_string(), "y.mkv".to_string()];
        store.set_custom_order(&videos);
        assert_eq!(store.custom_order(), videos);

        store.set_custom_order(&[]);
        assert!(store.custom_order().is_empty());
    }

    #[test]
    fn force_request_is_single_use() {
        let (_dir, store) = store();
        assert!(!store.force_pending());
        assert_eq!(store.take_force_request(), None);

        store.set_force_request("clip.mp4");
        assert!(store.force_pending());
        assert_eq!(store.take_force_request().as_deref(), Some("clip.mp4"));

        // Consumed: a second poll with no new write finds nothing
        assert!(!store.force_pending());
        assert_eq!(store.take_force_request(), None);
    }

    #[test]
    fn pause_flag_toggles() {
        let (_dir, store) = store();
        assert!(!store.paused());
        store.set_paused(true);
        assert!(store.paused());
        // Idempotent in both directions
        store.set_paused(true);
        assert!(store.paused());
        store.set_paused(false);
        assert!(!store.paused());
        store.set_paused(false);
        assert!(!store.paused());
    }

    #[test]
    fn now_playing_marker_uses_pause_sentinel() {
        let (_dir, store) = store();
        assert_eq!(store.now_playing(), None);

        store.set_now_playing(&NowPlaying::Video("a.mp4".to_string()));
        assert_eq!(store.now_playing().as_deref(), Some("a.mp4"));

        store.set_now_playing(&NowPlaying::Paused);
        assert_eq!(store.now_playing().as_deref(), Some(PAUSED_SENTINEL));
    }
}
