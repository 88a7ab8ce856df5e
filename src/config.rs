use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::audio::{playlist::HistoryPolicy, sink::ReconnectPolicy};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Límites
    pub max_song_duration: u64, // En segundos
    pub max_playlist_len: usize,
    pub max_history_length: usize,
    pub history_policy: HistoryPolicy,

    // Precarga
    pub max_preload: usize,
    pub preload_workers: usize,
    pub metadata_ttl: u64, // En segundos
    pub metadata_cache_size: usize,

    // Sesión
    pub idle_timeout: u64, // En segundos
    pub leave_when_idle: bool,

    // Presentación
    pub queue_page_size: usize,
    pub embed_queue_preview: usize,
    pub embed_history_preview: usize,

    // Binarios externos
    pub ytdlp_path: PathBuf,
    pub player_path: PathBuf,
    pub local_listeners: usize,
    pub reconnect_delay_max: u64, // En segundos
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Límites
            max_song_duration: std::env::var("MAX_SONG_DURATION")
                .unwrap_or_else(|_| "5400".to_string()) // 1.5 horas
                .parse()?,
            max_playlist_len: std::env::var("MAX_PLAYLIST_LEN")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            max_history_length: std::env::var("MAX_HISTORY_LENGTH")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            history_policy: std::env::var("HISTORY_POLICY")
                .unwrap_or_else(|_| "dedupe".to_string())
                .parse()?,

            // Precarga
            max_preload: std::env::var("MAX_PRELOAD")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            preload_workers: match std::env::var("PRELOAD_WORKERS") {
                Ok(val) if !val.trim().is_empty() => val.parse()?,
                _ => default_preload_workers(),
            },
            metadata_ttl: std::env::var("METADATA_TTL")
                .unwrap_or_else(|_| "3600".to_string()) // las URLs de stream caducan
                .parse()?,
            metadata_cache_size: std::env::var("METADATA_CACHE_SIZE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,

            // Sesión
            idle_timeout: std::env::var("IDLE_TIMEOUT")
                .unwrap_or_else(|_| "300".to_string()) // 5 minutos
                .parse()?,
            leave_when_idle: std::env::var("LEAVE_WHEN_IDLE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,

            // Presentación
            queue_page_size: std::env::var("QUEUE_PAGE_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            embed_queue_preview: std::env::var("EMBED_QUEUE_PREVIEW")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            embed_history_preview: std::env::var("EMBED_HISTORY_PREVIEW")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,

            // Binarios externos
            ytdlp_path: std::env::var("YTDLP_PATH")
                .unwrap_or_else(|_| "yt-dlp".to_string())
                .into(),
            player_path: std::env::var("PLAYER_PATH")
                .unwrap_or_else(|_| "ffplay".to_string())
                .into(),
            local_listeners: std::env::var("LOCAL_LISTENERS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            reconnect_delay_max: std::env::var("RECONNECT_DELAY_MAX")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Durations and timeouts must be greater than zero
    /// - History must keep at least one entry (`prev` relies on it)
    /// - The preload pool needs at least one worker
    /// - Page sizes must be greater than zero
    pub fn validate(&self) -> Result<()> {
        if self.max_song_duration == 0 {
            anyhow::bail!("Max song duration must be greater than 0");
        }

        if self.max_playlist_len == 0 {
            anyhow::bail!("Max playlist length must be greater than 0");
        }

        if self.max_history_length == 0 {
            anyhow::bail!("Max history length must be at least 1, got: {}", self.max_history_length);
        }

        if self.preload_workers == 0 {
            anyhow::bail!("Preload worker pool must have at least one worker");
        }

        if self.idle_timeout == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Limits: {} max duration, {} playlist items, {} history entries ({:?})\n  \
            Preload: {} ahead, {} workers, {} metadata TTL ({} entries)\n  \
            Session: {} idle timeout, leave when idle={}\n  \
            Backends: resolver={}, player={}",
            humantime::format_duration(Duration::from_secs(self.max_song_duration)),
            self.max_playlist_len,
            self.max_history_length,
            self.history_policy,
            self.max_preload,
            self.preload_workers,
            humantime::format_duration(Duration::from_secs(self.metadata_ttl)),
            self.metadata_cache_size,
            humantime::format_duration(Duration::from_secs(self.idle_timeout)),
            self.leave_when_idle,
            self.ytdlp_path.display(),
            self.player_path.display(),
        )
    }

    /// Configuración estática que recibe cada sesión al crearse
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_song_duration: Duration::from_secs(self.max_song_duration),
            max_playlist_len: self.max_playlist_len,
            max_history_length: self.max_history_length,
            history_policy: self.history_policy,
            max_preload: self.max_preload,
            idle_timeout: Duration::from_secs(self.idle_timeout),
            leave_when_idle: self.leave_when_idle,
            queue_page_size: self.queue_page_size,
            embed_queue_preview: self.embed_queue_preview,
            embed_history_preview: self.embed_history_preview,
            reconnect: ReconnectPolicy {
                delay_max: Duration::from_secs(self.reconnect_delay_max),
                ..ReconnectPolicy::default()
            },
        }
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            max_song_duration: 5400, // 1.5 horas
            max_playlist_len: 50,
            max_history_length: 50,
            history_policy: HistoryPolicy::Dedupe,

            max_preload: 2,
            preload_workers: default_preload_workers(),
            metadata_ttl: 3600,
            metadata_cache_size: 500,

            idle_timeout: 300,
            leave_when_idle: false,

            queue_page_size: 10,
            embed_queue_preview: 5,
            embed_history_preview: 3,

            ytdlp_path: "yt-dlp".into(),
            player_path: "ffplay".into(),
            local_listeners: 1,
            reconnect_delay_max: 5,
        }
    }
}

fn default_preload_workers() -> usize {
    num_cpus::get().clamp(1, 5)
}

/// Per-tenant settings injected into a session when it is created.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_song_duration: Duration,
    pub max_playlist_len: usize,
    pub max_history_length: usize,
    pub history_policy: HistoryPolicy,
    pub max_preload: usize,
    pub idle_timeout: Duration,
    pub leave_when_idle: bool,
    pub queue_page_size: usize,
    pub embed_queue_preview: usize,
    pub embed_history_preview: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Config::default().session_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.summary().contains("1h 30m"));

        let session = config.session_config();
        assert_eq!(session.idle_timeout, Duration::from_secs(300));
        assert_eq!(session.reconnect.delay_max, Duration::from_secs(5));
    }

    #[test]
    fn rejects_empty_history() {
        let config = Config {
            max_history_length: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        let config = Config {
            preload_workers: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
