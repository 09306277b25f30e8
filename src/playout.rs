use crate::control::{ControlStore, NowPlaying};
use crate::library::VideoLibrary;
use crate::playlist::PlaylistSelector;
use crate::transcode::Transcoder;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Outcome of one poll iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// The pause flag was present; `placeholder` says whether the
    /// placeholder image aired or the loop just idled.
    Paused { placeholder: bool },
    /// A force-next request was consumed; `video` is the name that
    /// streamed, or `None` when it resolved to nothing and was skipped.
    Forced { video: Option<String> },
    /// A rotation streamed this many entries before finishing or being
    /// interrupted by a control request.
    Played(usize),
    /// Empty library, nothing to play.
    Idle,
}

/// The playout state machine. Single task, fully sequential: every
/// transcoder call blocks the loop for the item's real-time duration, and
/// control input is only observed between calls. All coordination with the
/// panel goes through the control store; the loop keeps no state of its own
/// across iterations.
pub struct PlayoutLoop<T> {
    control: ControlStore,
    library: VideoLibrary,
    selector: PlaylistSelector,
    transcoder: T,
    pause_image: PathBuf,
    poll_interval: Duration,
    idle_wait: Duration,
}

impl<T: Transcoder> PlayoutLoop<T> {
    pub fn new(
        control: ControlStore,
        library: VideoLibrary,
        transcoder: T,
        pause_image: PathBuf,
        poll_interval: Duration,
        idle_wait: Duration,
    ) -> Self {
        let selector = PlaylistSelector::new(control.clone(), library.clone());
        Self {
            control,
            library,
            selector,
            transcoder,
            pause_image,
            poll_interval,
            idle_wait,
        }
    }

    /// Poll forever. Waits are applied here so `tick` stays directly
    /// drivable in tests.
    pub async fn run(mut self) {
        info!("Playout loop started");
        loop {
            match self.tick().await {
                Tick::Paused { placeholder: true } => sleep(self.poll_interval).await,
                Tick::Paused { placeholder: false } | Tick::Idle => sleep(self.idle_wait).await,
                Tick::Forced { .. } | Tick::Played(_) => {}
            }
        }
    }

    /// One iteration, evaluated in precedence order: pause, force,
    /// rotation.
    pub async fn tick(&mut self) -> Tick {
        if self.control.paused() {
            if self.pause_image.is_file() {
                self.control.set_now_playing(&NowPlaying::Paused);
                if let Err(error) = self.transcoder.stream_placeholder(&self.pause_image).await {
                    warn!(?error, "Failed to stream pause placeholder");
                }
                return Tick::Paused { placeholder: true };
            }
            warn!(
                image = %self.pause_image.display(),
                "Pause placeholder image missing, idling"
            );
            return Tick::Paused { placeholder: false };
        }

        if let Some(name) = self.control.take_force_request() {
            let video = match self.library.resolve(&name) {
                Some(path) => {
                    self.play(&name, &path).await;
                    Some(name)
                }
                None => {
                    warn!(video = %name, "Forced video not found in either library, skipping");
                    None
                }
            };
            return Tick::Forced { video };
        }

        let sequence = self.selector.next_sequence();
        if sequence.is_empty() {
            info!("No videos in the library, waiting");
            return Tick::Idle;
        }

        let mut played = 0;
        for name in sequence {
            // Pause and force take effect between items; the remainder of
            // an interrupted rotation is abandoned, never resumed.
            if self.control.paused() || self.control.force_pending() {
                info!(played, "Rotation interrupted by a control request");
                break;
            }
            let Some(path) = self.library.resolve(&name) else {
                warn!(video = %name, "Video vanished since listing, skipping");
                continue;
            };
            self.play(&name, &path).await;
            played += 1;
        }
        Tick::Played(played)
    }

    async fn play(&self, name: &str, path: &Path) {
        self.control
            .set_now_playing(&NowPlaying::Video(name.to_string()));
        info!(video = %name, "Streaming");
        if let Err(error) = self.transcoder.stream_video(path).await {
            warn!(video = %name, ?error, "Transcoder invocation failed");
        }
    }
}
