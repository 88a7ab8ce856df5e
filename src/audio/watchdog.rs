use parking_lot::Mutex;
use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Resettable idle timer.
///
/// Each `arm` cancels the previous timer and hands out a new generation. The
/// callback receives the generation it was armed with; a callback that lost
/// the race with a newer `arm` or a `cancel` sees `is_current == false` and
/// must do nothing.
#[derive(Debug, Default)]
pub struct Watchdog {
    generation: AtomicU64,
    token: Mutex<Option<CancellationToken>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arranca (o reinicia) el temporizador
    pub fn arm<F, Fut>(&self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let generation = {
            let mut slot = self.token.lock();
            if let Some(previous) = slot.replace(token.clone()) {
                previous.cancel();
            }
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    token.cancel();
                    debug!("⏰ Watchdog disparado (generación {})", generation);
                    on_fire(generation).await;
                }
            }
        });

        generation
    }

    /// Cancela el temporizador pendiente; cualquier disparo en vuelo queda obsoleto
    pub fn cancel(&self) {
        let mut slot = self.token.lock();
        if let Some(token) = slot.take() {
            token.cancel();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub fn is_armed(&self) -> bool {
        self.token
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}
