use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure that can be loaded from CLI args, a config
/// file, or both (CLI wins).
///
/// Example configuration file content
/// # Video Playout Configuration
///
/// # Server configuration
/// listen_on_port = 8080
/// panel_password = "change_me"
/// workspace = "/mnt/shared"
///
/// # Stream target (required)
/// rtmp_url = "rtmp://a.rtmp.youtube.com/live2/xxxx-xxxx"
///
/// # Encoder settings
/// resolution = "854x480"
/// video_bitrate = "800k"
/// max_bitrate = "1000k"
/// audio_bitrate = "96k"
/// preset = "veryfast"
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Port the control panel listens on
    #[arg(short, long, default_value_t = 8080)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Shared workspace holding the libraries and control files
    #[arg(short = 'w', long, default_value = "/mnt/shared")]
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// RTMP endpoint the playout loop streams to (required)
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtmp_url: Option<String>,

    /// Control panel password
    #[arg(long, default_value = "change_me")]
    #[serde(default = "default_password")]
    pub panel_password: String,

    /// Seconds between playout polls while paused
    #[arg(long, default_value_t = 1)]
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds to wait when there is nothing to play
    #[arg(long, default_value_t = 5)]
    #[serde(default = "default_idle_wait")]
    pub idle_wait_secs: u64,

    /// Placeholder image streamed while paused; defaults to
    /// paused_image.png inside the workspace
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_image: Option<String>,

    /// Output resolution, WIDTHxHEIGHT
    #[arg(long, default_value = "854x480")]
    #[serde(default = "default_resolution")]
    pub resolution: String,

    /// Target video bitrate
    #[arg(long, default_value = "800k")]
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// Video bitrate ceiling
    #[arg(long, default_value = "1000k")]
    #[serde(default = "default_max_bitrate")]
    pub max_bitrate: String,

    /// Audio bitrate
    #[arg(long, default_value = "96k")]
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// x264 preset
    #[arg(long, default_value = "veryfast")]
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Configuration file path (merged under CLI arguments)
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_on_port: default_port(),
            workspace: default_workspace(),
            rtmp_url: None,
            panel_password: default_password(),
            poll_interval_secs: default_poll_interval(),
            idle_wait_secs: default_idle_wait(),
            pause_image: None,
            resolution: default_resolution(),
            video_bitrate: default_video_bitrate(),
            max_bitrate: default_max_bitrate(),
            audio_bitrate: default_audio_bitrate(),
            preset: default_preset(),
            config: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.workspace == default_workspace() {
            self.workspace = file_config.workspace;
        }
        if self.panel_password == default_password() {
            self.panel_password = file_config.panel_password;
        }
        if self.poll_interval_secs == default_poll_interval() {
            self.poll_interval_secs = file_config.poll_interval_secs;
        }
        if self.idle_wait_secs == default_idle_wait() {
            self.idle_wait_secs = file_config.idle_wait_secs;
        }
        if self.resolution == default_resolution() {
            self.resolution = file_config.resolution;
        }
        if self.video_bitrate == default_video_bitrate() {
            self.video_bitrate = file_config.video_bitrate;
        }
        if self.max_bitrate == default_max_bitrate() {
            self.max_bitrate = file_config.max_bitrate;
        }
        if self.audio_bitrate == default_audio_bitrate() {
            self.audio_bitrate = file_config.audio_bitrate;
        }
        if self.preset == default_preset() {
            self.preset = file_config.preset;
        }

        // For Option fields, CLI takes precedence if Some
        if self.rtmp_url.is_none() {
            self.rtmp_url = file_config.rtmp_url;
        }
        if self.pause_image.is_none() {
            self.pause_image = file_config.pause_image;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.rtmp_url.as_deref() {
            None => {
                return Err(anyhow::anyhow!(
                    "RTMP endpoint is required: set --rtmp-url or rtmp_url in the config file"
                ));
            }
            Some(url) if url.is_empty() => {
                return Err(anyhow::anyhow!("RTMP endpoint cannot be empty"));
            }
            Some(url) if !url.starts_with("rtmp://") && !url.starts_with("rtmps://") => {
                return Err(anyhow::anyhow!(
                    "RTMP endpoint must start with rtmp:// or rtmps://"
                ));
            }
            Some(_) => {}
        }

        let mut parts = self.resolution.split('x');
        let valid = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(w), Some(h), None)
                if w.parse::<u32>().map(|n| n > 0).unwrap_or(false)
                    && h.parse::<u32>().map(|n| n > 0).unwrap_or(false)
        );
        if !valid {
            return Err(anyhow::anyhow!(
                "Invalid resolution {:?}: expected WIDTHxHEIGHT",
                self.resolution
            ));
        }

        for (name, value) in [
            ("video_bitrate", &self.video_bitrate),
            ("max_bitrate", &self.max_bitrate),
            ("audio_bitrate", &self.audio_bitrate),
            ("preset", &self.preset),
        ] {
            if value.is_empty() {
                return Err(anyhow::anyhow!("{name} cannot be empty"));
            }
        }

        if self.panel_password.is_empty() {
            return Err(anyhow::anyhow!("panel_password cannot be empty"));
        }

        Ok(())
    }
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_workspace() -> String {
    "/mnt/shared".to_string()
}

fn default_password() -> String {
    "change_me".to_string()
}

fn default_poll_interval() -> u64 {
    1
}

fn default_idle_wait() -> u64 {
    5
}

fn default_resolution() -> String {
    "854x480".to_string()
}

fn default_video_bitrate() -> String {
    "800k".to_string()
}

fn default_max_bitrate() -> String {
    "1000k".to_string()
}

fn default_audio_bitrate() -> String {
    "96k".to_string()
}

fn default_preset() -> String {
    "veryfast".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_rtmp() -> Config {
        Config {
            rtmp_url: Some("rtmp://example.com/live/key".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn rtmp_url_is_required() {
        let config = Config::default();
        assert!(config.validate().is_err());

        assert!(with_rtmp().validate().is_ok());
    }

    #[test]
    fn rtmp_url_scheme_is_checked() {
        let mut config = with_rtmp();
        config.rtmp_url = Some("http://example.com/live".to_string());
        assert!(config.validate().is_err());

        config.rtmp_url = Some("rtmps://example.com/live".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn resolution_must_be_width_x_height() {
        let mut config = with_rtmp();
        for bad in ["854", "854x", "x480", "854x480x2", "0x480", "wxh"] {
            config.resolution = bad.to_string();
            assert!(config.validate().is_err(), "accepted {bad:?}");
        }

        config.resolution = "1280x720".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_config_merges_under_cli() {
        let file = Config {
            listen_on_port: 9000,
            rtmp_url: Some("rtmp://file.example/live".to_string()),
            preset: "slow".to_string(),
            ..Default::default()
        };

        let merged = with_rtmp().merge_with_file(file);
        assert_eq!(merged.listen_on_port, 9000);
        assert_eq!(merged.preset, "slow");
        // CLI already provided an endpoint, the file does not override it
        assert_eq!(
            merged.rtmp_url.as_deref(),
            Some("rtmp://example.com/live/key")
        );
    }
}
