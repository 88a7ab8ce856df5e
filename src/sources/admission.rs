use std::time::Duration;
use tracing::{debug, info};

use super::{Descriptor, Resolved};
use crate::{
    config::SessionConfig,
    error::{PlayerError, Result},
};

/// Límites que aplica el llamador antes de encolar
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_song_duration: Duration,
    pub max_playlist_len: usize,
}

impl From<&SessionConfig> for Limits {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_song_duration: config.max_song_duration,
            max_playlist_len: config.max_playlist_len,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    TooLong(Duration),
    Restricted,
}

/// Item de una playlist que no se encoló
#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub title: String,
    pub reason: ExclusionReason,
}

/// Lo que sobrevive a los límites
#[derive(Debug, Clone, Default)]
pub struct Admission {
    pub accepted: Vec<Descriptor>,
    pub excluded: Vec<Exclusion>,
    /// Entradas descartadas por superar `max_playlist_len`
    pub truncated: usize,
}

/// Applies the caller-side rules to a resolver answer.
///
/// A single item longer than the limit is an error. A playlist is capped at
/// `max_playlist_len`, and its too-long and restricted entries are reported
/// as exclusions instead of failing the whole request. Items whose duration
/// is still unknown are admitted and checked again at play time.
pub fn admit(resolved: Resolved, limits: &Limits) -> Result<Admission> {
    match resolved {
        Resolved::Single(descriptor) => {
            if let Some(duration) = descriptor.info.duration {
                if duration > limits.max_song_duration {
                    return Err(PlayerError::TooLong {
                        title: descriptor.title(),
                        duration,
                        max: limits.max_song_duration,
                    });
                }
            }
            Ok(Admission {
                accepted: vec![descriptor],
                ..Admission::default()
            })
        }
        Resolved::Playlist(entries) => {
            let total = entries.len();
            let mut admission = Admission {
                truncated: total.saturating_sub(limits.max_playlist_len),
                ..Admission::default()
            };

            for entry in entries.into_iter().take(limits.max_playlist_len) {
                match entry {
                    Ok(descriptor) => match descriptor.info.duration {
                        Some(duration) if duration > limits.max_song_duration => {
                            admission.excluded.push(Exclusion {
                                title: descriptor.title(),
                                reason: ExclusionReason::TooLong(duration),
                            });
                        }
                        _ => admission.accepted.push(descriptor),
                    },
                    Err(PlayerError::RestrictedContent(title)) => {
                        debug!("🚫 Entrada restringida omitida: {}", title);
                        admission.excluded.push(Exclusion {
                            title,
                            reason: ExclusionReason::Restricted,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }

            if admission.accepted.is_empty() && admission.excluded.is_empty() {
                return Err(PlayerError::NotFound("empty playlist".to_string()));
            }

            info!(
                "📋 Playlist admitida: {} aceptadas, {} excluidas, {} truncadas",
                admission.accepted.len(),
                admission.excluded.len(),
                admission.truncated
            );
            Ok(admission)
        }
    }
}
