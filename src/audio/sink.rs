use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::sync::oneshot;

use crate::audio::registry::TenantId;

/// Errores reportados por la salida de audio
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("output rejected playback: {0}")]
    Rejected(String),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("player exited with status {0:?}")]
    Exited(Option<i32>),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("completion dropped without a result")]
    Dropped,
}

/// Opciones de reconexión del stream (equivalentes a `-reconnect*` de ffmpeg)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub reconnect: bool,
    pub reconnect_streamed: bool,
    pub delay_max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            reconnect: true,
            reconnect_streamed: true,
            delay_max: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    pub fn ffmpeg_args(&self) -> Vec<String> {
        if !self.reconnect {
            return Vec::new();
        }
        vec![
            "-reconnect".to_string(),
            "1".to_string(),
            "-reconnect_streamed".to_string(),
            if self.reconnect_streamed { "1" } else { "0" }.to_string(),
            "-reconnect_delay_max".to_string(),
            self.delay_max.as_secs().to_string(),
        ]
    }
}

/// Mitad emisora de una finalización; se consume al disparar
#[derive(Debug)]
pub struct CompletionSender(oneshot::Sender<Option<SinkError>>);

impl CompletionSender {
    pub fn finish(self, error: Option<SinkError>) {
        // El receptor puede haberse descartado tras un teardown
        let _ = self.0.send(error);
    }
}

/// Single-fire completion of one `Sink::play` call.
///
/// Resolves exactly once: on natural end, on explicit stop or on a fatal
/// error. A sender dropped without finishing counts as `SinkError::Dropped`.
#[derive(Debug)]
pub struct Completion(oneshot::Receiver<Option<SinkError>>);

impl Completion {
    pub fn channel() -> (CompletionSender, Completion) {
        let (tx, rx) = oneshot::channel();
        (CompletionSender(tx), Completion(rx))
    }

    pub async fn wait(self) -> Option<SinkError> {
        match self.0.await {
            Ok(result) => result,
            Err(_) => Some(SinkError::Dropped),
        }
    }
}

/// Salida de audio de una sesión
#[async_trait]
pub trait Sink: Send + Sync {
    /// Empieza a reproducir; la finalización llega por el `Completion`
    async fn play(&self, source_url: &str, policy: &ReconnectPolicy) -> Result<Completion, SinkError>;

    /// Idempotente; siempre termina disparando la finalización pendiente
    async fn stop(&self);

    async fn pause(&self) -> Result<(), SinkError>;

    async fn resume(&self) -> Result<(), SinkError>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;

    /// Otros ocupantes del canal de salida (sin contar al reproductor)
    async fn listeners(&self) -> usize;

    /// Libera la salida
    async fn disconnect(&self);
}

/// Abre la salida de cada tenant nuevo
pub trait SinkFactory: Send + Sync {
    fn open(&self, tenant: TenantId) -> Arc<dyn Sink>;
}
