use crate::config::Config;
use anyhow::Context as _;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Length of one looped-placeholder segment while paused.
const PLACEHOLDER_SEGMENT_SECS: u32 = 10;

/// Seam between the playout loop and the external transcoding process.
/// Both calls block until the process exits; the loop relies on that to
/// pace playback in real time.
pub trait Transcoder {
    fn stream_video(&self, source: &Path) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn stream_placeholder(&self, image: &Path) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub resolution: String,
    pub video_bitrate: String,
    pub max_bitrate: String,
    pub audio_bitrate: String,
    pub preset: String,
}

impl From<&Config> for EncoderSettings {
    fn from(config: &Config) -> Self {
        Self {
            resolution: config.resolution.clone(),
            video_bitrate: config.video_bitrate.clone(),
            max_bitrate: config.max_bitrate.clone(),
            audio_bitrate: config.audio_bitrate.clone(),
            preset: config.preset.clone(),
        }
    }
}

/// Streams sources to the RTMP endpoint by spawning the external `ffmpeg`
/// binary. Output is not parsed and the exit status is logged but never
/// acted upon; a failed invocation looks like a very short video.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    rtmp_url: String,
    encoder: EncoderSettings,
}

impl FfmpegTranscoder {
    pub fn new(rtmp_url: String, encoder: EncoderSettings) -> Self {
        Self { rtmp_url, encoder }
    }

    fn video_filter(&self) -> String {
        format!("scale={}:flags=lanczos", self.encoder.resolution)
    }

    fn push_video_encoder_args(&self, args: &mut Vec<String>) {
        let encoder = &self.encoder;
        args.extend(
            [
                "-vf",
                &self.video_filter(),
                "-c:v",
                "libx264",
                "-preset",
                &encoder.preset,
                "-b:v",
                &encoder.video_bitrate,
                "-maxrate",
                &encoder.max_bitrate,
                "-bufsize",
                "2000k",
                "-g",
                "48",
                "-keyint_min",
                "48",
            ]
            .map(str::to_string),
        );
    }

    /// Argument vector for streaming one video in real time.
    pub fn video_args(&self, source: &Path) -> Vec<String> {
        let mut args = vec![
            "-re".to_string(),
            "-i".to_string(),
            source.display().to_string(),
        ];
        self.push_video_encoder_args(&mut args);
        args.extend(
            [
                "-c:a",
                "aac",
                "-b:a",
                &self.encoder.audio_bitrate,
                "-ar",
                "44100",
                "-f",
                "flv",
                &self.rtmp_url,
            ]
            .map(str::to_string),
        );
        args
    }

    /// Argument vector for one looped-placeholder segment (no audio input).
    pub fn placeholder_args(&self, image: &Path) -> Vec<String> {
        let mut args = vec![
            "-loop".to_string(),
            "1".to_string(),
            "-i".to_string(),
            image.display().to_string(),
        ];
        self.push_video_encoder_args(&mut args);
        args.extend(
            [
                "-t",
                &PLACEHOLDER_SEGMENT_SECS.to_string(),
                "-f",
                "flv",
                &self.rtmp_url,
            ]
            .map(str::to_string),
        );
        args
    }
}

async fn run_ffmpeg(args: &[String]) -> anyhow::Result<()> {
    debug!(?args, "Spawning ffmpeg");
    let status = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .status()
        .await
        .context("Failed to spawn ffmpeg")?;

    // Exit status is advisory only: the loop proceeds either way.
    if !status.success() {
        warn!(%status, "ffmpeg exited with non-success status");
    }
    Ok(())
}

impl Transcoder for FfmpegTranscoder {
    fn stream_video(&self, source: &Path) -> impl Future<Output = anyhow::Result<()>> + Send {
        let args = self.video_args(source);
        async move { run_ffmpeg(&args).await }
    }

    fn stream_placeholder(&self, image: &Path) -> impl Future<Output = anyhow::Result<()>> + Send {
        let args = self.placeholder_args(image);
        async move { run_ffmpeg(&args).await }
    }
}
