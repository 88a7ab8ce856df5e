//! Error taxonomy shared by the playlist, the session and the adapters.

use std::time::Duration;

use crate::audio::sink::SinkError;

/// Errores del motor de reproducción
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlayerError {
    #[error("nothing found for request: {0}")]
    NotFound(String),

    #[error("restricted content: {0}")]
    RestrictedContent(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("'{title}' is too long ({}s > {}s)", .duration.as_secs(), .max.as_secs())]
    TooLong {
        title: String,
        duration: Duration,
        max: Duration,
    },

    #[error("auto-generated mixes are not allowed")]
    RadioNotAllowed,

    #[error("index {index} out of range (queue length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("history is empty")]
    EmptyHistory,

    #[error("queue is empty")]
    EmptyQueue,

    #[error("nothing is playing")]
    NothingPlaying,

    #[error("session has been torn down")]
    SessionClosed,

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl PlayerError {
    /// Texto corto para mostrar al usuario
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::NotFound(_) => "Could not find anything. Sorry.".to_string(),
            PlayerError::RestrictedContent(_) => {
                "Detected private or restricted video(s), skipping. Sorry.".to_string()
            }
            PlayerError::Upstream(reason) => {
                format!("There was an error processing your request.\n{}", reason)
            }
            PlayerError::TooLong { title, max, .. } => format!(
                "`{}` is too long. Maximum duration is {}.",
                title,
                humantime::format_duration(*max)
            ),
            PlayerError::RadioNotAllowed => "You can't request YouTube Mixes. Sorry.".to_string(),
            PlayerError::IndexOutOfRange { .. } => {
                "Please specify the correct index of a song to remove.".to_string()
            }
            PlayerError::EmptyHistory => "History is empty.".to_string(),
            PlayerError::EmptyQueue => "There are currently no more queued songs.".to_string(),
            PlayerError::NothingPlaying => "I'm not currently playing anything.".to_string(),
            PlayerError::SessionClosed => "The player was stopped, try again.".to_string(),
            PlayerError::Sink(e) => format!("Playback failed: {}", e),
        }
    }

    /// Errores tras los cuales la sesión ya no puede seguir reproduciendo
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, PlayerError::SessionClosed)
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
