use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    path::PathBuf,
    process::Stdio,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    registry::TenantId,
    sink::{Completion, ReconnectPolicy, Sink, SinkError, SinkFactory},
};

/// Reproducción en curso de un proceso ffplay
struct Playback {
    pid: Option<u32>,
    stop: CancellationToken,
    finished: Arc<AtomicBool>,
    paused: bool,
}

/// Salida local: un proceso `ffplay` por track
pub struct FfplaySink {
    binary: PathBuf,
    listeners: usize,
    current: Mutex<Option<Playback>>,
}

impl FfplaySink {
    pub fn new(binary: impl Into<PathBuf>, listeners: usize) -> Self {
        Self {
            binary: binary.into(),
            listeners,
            current: Mutex::new(None),
        }
    }

    fn take_current(&self) -> Option<Playback> {
        self.current.lock().take()
    }

    async fn signal(&self, signal: &str) -> Result<(), SinkError> {
        let pid = self
            .current
            .lock()
            .as_ref()
            .filter(|p| !p.finished.load(Ordering::SeqCst))
            .and_then(|p| p.pid)
            .ok_or_else(|| SinkError::Rejected("nothing playing".to_string()))?;

        let status = Command::new("kill")
            .args([signal, &pid.to_string()])
            .status()
            .await
            .map_err(|e| SinkError::Rejected(format!("kill {}: {}", signal, e)))?;

        if !status.success() {
            return Err(SinkError::Rejected(format!("kill {} {} failed", signal, pid)));
        }
        Ok(())
    }

    fn set_paused(&self, paused: bool) {
        if let Some(playback) = self.current.lock().as_mut() {
            playback.paused = paused;
        }
    }
}

/// Argumentos de ffplay para reproducir `source_url` sin ventana
fn player_args(source_url: &str, policy: &ReconnectPolicy) -> Vec<String> {
    let mut args: Vec<String> = ["-nodisp", "-autoexit", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.extend(policy.ffmpeg_args());
    args.push("-i".to_string());
    args.push(source_url.to_string());
    args
}

#[async_trait]
impl Sink for FfplaySink {
    async fn play(&self, source_url: &str, policy: &ReconnectPolicy) -> Result<Completion, SinkError> {
        self.stop().await;

        let mut child = Command::new(&self.binary)
            .args(player_args(source_url, policy))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SinkError::Rejected(format!("{}: {}", self.binary.display(), e)))?;

        let (sender, completion) = Completion::channel();
        let stop = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));
        let pid = child.id();
        debug!("🔊 ffplay iniciado (pid {:?})", pid);

        {
            let stop = stop.clone();
            let finished = finished.clone();
            tokio::spawn(async move {
                let outcome = tokio::select! {
                    status = child.wait() => Some(status),
                    _ = stop.cancelled() => None,
                };
                let error = match outcome {
                    None => {
                        if let Err(e) = child.kill().await {
                            warn!("⚠️ No se pudo matar ffplay: {}", e);
                        }
                        None
                    }
                    Some(Ok(status)) if status.success() => None,
                    Some(Ok(status)) => Some(SinkError::Exited(status.code())),
                    Some(Err(e)) => Some(SinkError::Playback(e.to_string())),
                };
                finished.store(true, Ordering::SeqCst);
                sender.finish(error);
            });
        }

        *self.current.lock() = Some(Playback {
            pid,
            stop,
            finished,
            paused: false,
        });
        Ok(completion)
    }

    async fn stop(&self) {
        if let Some(playback) = self.take_current() {
            playback.stop.cancel();
        }
    }

    async fn pause(&self) -> Result<(), SinkError> {
        self.signal("-STOP").await?;
        self.set_paused(true);
        Ok(())
    }

    async fn resume(&self) -> Result<(), SinkError> {
        self.signal("-CONT").await?;
        self.set_paused(false);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|p| !p.paused && !p.finished.load(Ordering::SeqCst))
    }

    async fn is_paused(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|p| p.paused && !p.finished.load(Ordering::SeqCst))
    }

    async fn listeners(&self) -> usize {
        self.listeners
    }

    async fn disconnect(&self) {
        self.stop().await;
    }
}

/// Abre un [`FfplaySink`] por tenant
pub struct FfplaySinkFactory {
    binary: PathBuf,
    listeners: usize,
}

impl FfplaySinkFactory {
    pub fn new(binary: impl Into<PathBuf>, listeners: usize) -> Self {
        Self {
            binary: binary.into(),
            listeners,
        }
    }
}

impl SinkFactory for FfplaySinkFactory {
    fn open(&self, tenant: TenantId) -> Arc<dyn Sink> {
        info!("🔊 Abriendo salida ffplay para {}", tenant);
        Arc::new(FfplaySink::new(self.binary.clone(), self.listeners))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn args_carry_reconnect_policy() {
        let args = player_args("https://cdn/a.m4a", &ReconnectPolicy::default());
        assert_eq!(
            args.join(" "),
            "-nodisp -autoexit -loglevel error -reconnect 1 -reconnect_streamed 1 \
             -reconnect_delay_max 5 -i https://cdn/a.m4a"
        );
    }

    #[tokio::test]
    async fn missing_binary_is_rejected() {
        let sink = FfplaySink::new("/nonexistent/ffplay", 1);
        let result = sink.play("https://cdn/a.m4a", &ReconnectPolicy::default()).await;

        assert!(matches!(result, Err(SinkError::Rejected(_))));
        assert!(!sink.is_playing().await);
        assert!(matches!(sink.pause().await, Err(SinkError::Rejected(_))));
        assert_eq!(sink.listeners().await, 1);
    }
}
