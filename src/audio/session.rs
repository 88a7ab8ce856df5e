use serde::Serialize;
use std::{
    fmt,
    sync::{Arc, Weak},
};
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::{
    playlist::{Page, PageSource, Playlist},
    preloader::Preloader,
    registry::{Registry, TenantId},
    sink::{Completion, Sink, SinkError},
    watchdog::Watchdog,
};
use crate::{
    config::SessionConfig,
    error::{PlayerError, Result},
    sources::{admit, Exclusion, Limits, Requester, Track, TrackSnapshot},
    ui::{MessageHandle, Notifier, NowPlaying, QueueListing},
};

/// Estado observable del reproductor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerState {
    Idle,
    /// Hay track actual pero su metadata todavía se está resolviendo
    Loading,
    Playing,
    Paused,
    /// La sesión fue cerrada
    Stopped,
}

impl PlayerState {
    fn is_active(self) -> bool {
        matches!(self, PlayerState::Playing | PlayerState::Paused)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlayerState::Idle => "idle",
            PlayerState::Loading => "loading",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Resultado de un `enqueue`
#[derive(Debug, Clone, Default)]
pub struct EnqueueReport {
    pub added: Vec<String>,
    pub excluded: Vec<Exclusion>,
    /// Entradas de playlist que no entraron por el límite
    pub truncated: usize,
    /// Primer error al arrancar la reproducción, si la hubo
    pub play_error: Option<PlayerError>,
}

/// Vista de solo lectura de una sesión
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub tenant: TenantId,
    pub state: PlayerState,
    pub looping: bool,
    pub current: Option<TrackSnapshot>,
    pub queue: Vec<TrackSnapshot>,
    pub history: Vec<TrackSnapshot>,
}

struct SessionState {
    playlist: Playlist,
    current: Option<Arc<Track>>,
    player: PlayerState,
    /// Ticket de la reproducción vigente; las finalizaciones con otro ticket se ignoran
    epoch: u64,
    now_playing: Option<MessageHandle>,
    closed: bool,
}

enum Start {
    Playing,
    Superseded,
    Failed {
        error: PlayerError,
        next: Option<(Arc<Track>, u64)>,
    },
}

/// Playback context of one tenant.
///
/// All mutable state sits behind a single async mutex. Metadata resolution
/// and resolver calls happen with the lock released; every play carries an
/// epoch ticket, and anything that comes back with an outdated ticket (a
/// resolution that lost to `stop`, the completion of a track that was
/// skipped past) is dropped.
pub struct Session {
    tenant: TenantId,
    config: SessionConfig,
    state: Mutex<SessionState>,
    sink: Arc<dyn Sink>,
    preloader: Preloader,
    notifier: Arc<dyn Notifier>,
    watchdog: Watchdog,
    status: watch::Sender<PlayerState>,
    registry: Weak<Registry>,
    me: Weak<Session>,
}

impl Session {
    pub fn new(
        tenant: TenantId,
        config: SessionConfig,
        sink: Arc<dyn Sink>,
        preloader: Preloader,
        notifier: Arc<dyn Notifier>,
        registry: Weak<Registry>,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(PlayerState::Idle);
        let session = Arc::new_cyclic(|me| Self {
            tenant,
            state: Mutex::new(SessionState {
                playlist: Playlist::new(config.max_history_length, config.history_policy),
                current: None,
                player: PlayerState::Idle,
                epoch: 0,
                now_playing: None,
                closed: false,
            }),
            config,
            sink,
            preloader,
            notifier,
            watchdog: Watchdog::new(),
            status,
            registry,
            me: me.clone(),
        });
        session.reset_watchdog();
        session
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    pub fn state(&self) -> PlayerState {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.status.subscribe()
    }

    async fn lock_open(&self) -> Result<MutexGuard<'_, SessionState>> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(PlayerError::SessionClosed);
        }
        Ok(state)
    }

    fn publish(&self, state: &mut SessionState, player: PlayerState) {
        state.player = player;
        self.status.send_replace(player);
    }

    // ── Cola ────────────────────────────────────────────────────────────

    /// Resuelve un request, aplica los límites y lo encola
    pub async fn enqueue(&self, request: &str, requested_by: Requester) -> Result<EnqueueReport> {
        drop(self.lock_open().await?);
        self.reset_watchdog();

        let resolved = self.preloader.resolver().resolve_request(request).await?;
        let admission = admit(resolved, &Limits::from(&self.config))?;

        let tracks: Vec<Arc<Track>> = admission
            .accepted
            .into_iter()
            .map(|descriptor| Arc::new(descriptor.into_track(requested_by.clone())))
            .collect();

        let mut report = EnqueueReport {
            added: tracks.iter().map(|t| t.title()).collect(),
            excluded: admission.excluded,
            truncated: admission.truncated,
            play_error: None,
        };
        info!(
            "➕ {} agregó {} track(s) en {}",
            requested_by,
            report.added.len(),
            self.tenant
        );

        match self.enqueue_tracks(tracks).await {
            Ok(()) => {}
            Err(PlayerError::SessionClosed) => return Err(PlayerError::SessionClosed),
            Err(e) => report.play_error = Some(e),
        }
        Ok(report)
    }

    /// Encola un track ya construido
    pub async fn enqueue_track(&self, track: Arc<Track>) -> Result<()> {
        self.reset_watchdog();
        self.enqueue_tracks(vec![track]).await
    }

    async fn enqueue_tracks(&self, tracks: Vec<Arc<Track>>) -> Result<()> {
        let mut state = self.lock_open().await?;
        for track in tracks {
            state.playlist.enqueue(track);
        }

        if state.current.is_none() {
            if let Some(front) = state.playlist.upcoming(1).pop() {
                let ticket = self.begin(&mut state, front.clone());
                drop(state);
                return self.launch(front, ticket).await;
            }
        } else {
            self.preload(&state);
        }
        Ok(())
    }

    /// Elimina un track de la cola (posición 0-based)
    pub async fn remove(&self, index: usize) -> Result<TrackSnapshot> {
        let mut state = self.lock_open().await?;
        self.reset_watchdog();
        let track = state.playlist.remove_at(index)?;
        info!("❌ {} eliminado de la cola de {}", track.title(), self.tenant);
        Ok(track.snapshot())
    }

    pub async fn shuffle(&self) -> Result<()> {
        let mut state = self.lock_open().await?;
        self.reset_watchdog();
        state.playlist.shuffle();
        self.preload(&state);
        Ok(())
    }

    pub async fn toggle_loop(&self) -> Result<bool> {
        let mut state = self.lock_open().await?;
        self.reset_watchdog();
        let enabled = state.playlist.toggle_loop();
        info!("🔂 Loop {} en {}", if enabled { "activado" } else { "desactivado" }, self.tenant);
        Ok(enabled)
    }

    pub async fn set_loop(&self, enabled: bool) -> Result<()> {
        let mut state = self.lock_open().await?;
        self.reset_watchdog();
        state.playlist.set_loop(enabled);
        Ok(())
    }

    // ── Transporte ──────────────────────────────────────────────────────

    /// Detiene el track actual; la finalización normal avanza la cola
    pub async fn skip(&self) -> Result<()> {
        let state = self.lock_open().await?;
        self.reset_watchdog();
        if !state.player.is_active() {
            return Err(PlayerError::NothingPlaying);
        }
        info!("⏭️ Saltando track en {}", self.tenant);
        self.sink.stop().await;
        Ok(())
    }

    /// Como `skip`, pero desactiva el loop
    pub async fn next(&self) -> Result<()> {
        let mut state = self.lock_open().await?;
        self.reset_watchdog();
        if state.playlist.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        if !state.player.is_active() {
            return Err(PlayerError::NothingPlaying);
        }
        state.playlist.set_loop(false);
        self.sink.stop().await;
        Ok(())
    }

    /// Vuelve al track anterior
    pub async fn prev(&self) -> Result<()> {
        let mut state = self.lock_open().await?;
        self.reset_watchdog();
        state.playlist.set_loop(false);

        if state.playlist.history_len() == 0 {
            return Err(PlayerError::EmptyHistory);
        }

        // Un track en Loading todavía no está en el historial
        let active = state.player.is_active();
        let current = if active { state.current.clone() } else { None };
        let target = state
            .playlist
            .previous(current.as_ref())
            .ok_or(PlayerError::EmptyHistory)?;
        info!("⏮️ Volviendo a {} en {}", target.title(), self.tenant);

        // El ticket nuevo deja obsoleta la finalización del track cortado
        let ticket = self.begin(&mut state, target.clone());
        if active {
            self.sink.stop().await;
        }
        drop(state);
        self.launch(target, ticket).await
    }

    /// Vacía la cola sin cortar el track actual
    pub async fn clear(&self) -> Result<usize> {
        let mut state = self.lock_open().await?;
        self.reset_watchdog();
        let removed = state.playlist.len();
        state.playlist.clear();
        info!("🗑️ Cola de {} vaciada ({} tracks)", self.tenant, removed);
        Ok(removed)
    }

    /// Vacía la cola y corta la reproducción; el historial se conserva
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.lock_open().await?;
        self.reset_watchdog();

        state.playlist.set_loop(false);
        state.playlist.advance();
        state.playlist.clear();

        let was = state.player;
        state.epoch += 1;
        state.current = None;
        self.publish(&mut state, PlayerState::Idle);
        let handle = state.now_playing.take();

        if was.is_active() {
            self.sink.stop().await;
        }
        drop(state);

        if let Some(handle) = handle {
            self.delete_message(handle).await;
        }
        if was != PlayerState::Idle {
            info!("⏹️ Reproducción detenida en {}", self.tenant);
        }
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let mut state = self.lock_open().await?;
        self.reset_watchdog();
        match state.player {
            PlayerState::Paused => Ok(()),
            PlayerState::Playing => {
                self.sink.pause().await?;
                self.publish(&mut state, PlayerState::Paused);
                info!("⏸️ Pausado en {}", self.tenant);
                Ok(())
            }
            _ => Err(PlayerError::NothingPlaying),
        }
    }

    pub async fn resume(&self) -> Result<()> {
        let mut state = self.lock_open().await?;
        self.reset_watchdog();
        match state.player {
            PlayerState::Playing => Ok(()),
            PlayerState::Paused => {
                self.sink.resume().await?;
                self.publish(&mut state, PlayerState::Playing);
                info!("▶️ Reanudado en {}", self.tenant);
                Ok(())
            }
            _ => Err(PlayerError::NothingPlaying),
        }
    }

    // ── Vistas ──────────────────────────────────────────────────────────

    pub async fn queue_page(&self, page: Option<usize>) -> Result<Page> {
        self.page(PageSource::Queue, page).await
    }

    pub async fn history_page(&self, page: Option<usize>) -> Result<Page> {
        self.page(PageSource::History, page).await
    }

    async fn page(&self, source: PageSource, page: Option<usize>) -> Result<Page> {
        let state = self.lock_open().await?;
        self.reset_watchdog();
        Ok(state
            .playlist
            .page(source, page, self.config.queue_page_size))
    }

    pub async fn show_queue(&self, page: Option<usize>) -> Result<QueueListing> {
        self.show(PageSource::Queue, page).await
    }

    pub async fn show_history(&self, page: Option<usize>) -> Result<QueueListing> {
        self.show(PageSource::History, page).await
    }

    async fn show(&self, source: PageSource, page: Option<usize>) -> Result<QueueListing> {
        let listing = {
            let state = self.lock_open().await?;
            self.reset_watchdog();
            let page = state
                .playlist
                .page(source, page, self.config.queue_page_size);
            QueueListing::from_page(&page, state.current.as_deref())
        };

        if let Err(e) = self.notifier.send_queue_listing(self.tenant, &listing).await {
            warn!("⚠️ No se pudo enviar el listado a {}: {}", self.tenant, e);
        }
        Ok(listing)
    }

    pub async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        let state = self.lock_open().await?;
        Ok(state.current.as_ref().map(|track| {
            NowPlaying::new(
                track,
                &state.playlist,
                self.config.embed_queue_preview,
                self.config.embed_history_preview,
            )
        }))
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            tenant: self.tenant,
            state: state.player,
            looping: state.playlist.is_looping(),
            current: state.current.as_ref().map(|t| t.snapshot()),
            queue: state.playlist.queue().map(|t| t.snapshot()).collect(),
            history: state.playlist.history().map(|t| t.snapshot()).collect(),
        }
    }

    // ── Ciclo de reproducción ───────────────────────────────────────────

    /// Marca `track` como actual y abre un ticket nuevo
    fn begin(&self, state: &mut SessionState, track: Arc<Track>) -> u64 {
        state.epoch += 1;
        debug!("⏳ Cargando {} (ticket {})", track.title(), state.epoch);
        state.current = Some(track);
        self.publish(state, PlayerState::Loading);
        state.epoch
    }

    /// Reproduce `track`, saltando los que fallen; devuelve el primer error
    async fn launch(&self, track: Arc<Track>, ticket: u64) -> Result<()> {
        let (mut track, mut ticket) = (track, ticket);
        let mut first_error = None;

        loop {
            match self.start(&track, ticket).await {
                Start::Playing | Start::Superseded => break,
                Start::Failed { error, next } => {
                    warn!("⚠️ No se pudo reproducir {}: {}", track.title(), error);
                    first_error.get_or_insert(error);
                    match next {
                        Some((t, k)) => {
                            track = t;
                            ticket = k;
                        }
                        None => break,
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn start(&self, track: &Arc<Track>, ticket: u64) -> Start {
        let resolved = self.preloader.resolve(track).await;

        let mut state = self.state.lock().await;
        if state.closed || state.epoch != ticket {
            debug!("🚫 Carga de {} descartada (ticket {})", track.title(), ticket);
            return Start::Superseded;
        }

        let outcome = match resolved {
            Ok(()) => self.open_stream(track).await,
            Err(e) => Err(e),
        };
        let completion = match outcome {
            Ok(completion) => completion,
            Err(error) => {
                if matches!(error, PlayerError::Sink(_)) {
                    // La URL de stream cacheada pudo haber expirado
                    self.preloader.cache().invalidate(&track.lookup_url());
                }
                let next = self.fail(&mut state, track);
                return Start::Failed { error, next };
            }
        };

        state.playlist.push_history(track.clone());
        state.playlist.pop_front_if(track.id());
        self.publish(&mut state, PlayerState::Playing);
        self.preload(&state);
        info!("🎵 Reproduciendo en {}: {}", self.tenant, track.title());

        let message = NowPlaying::new(
            track,
            &state.playlist,
            self.config.embed_queue_preview,
            self.config.embed_history_preview,
        );
        if let Some(old) = state.now_playing.take() {
            self.delete_message(old).await;
        }
        match self.notifier.send_now_playing(self.tenant, &message).await {
            Ok(handle) => state.now_playing = Some(handle),
            Err(e) => warn!("⚠️ No se pudo anunciar el track en {}: {}", self.tenant, e),
        }

        if !state.playlist.is_looping() {
            self.reset_watchdog();
        }
        self.spawn_waiter(ticket, completion);
        Start::Playing
    }

    async fn open_stream(&self, track: &Track) -> Result<Completion> {
        if let Some(duration) = track.duration() {
            if duration > self.config.max_song_duration {
                return Err(PlayerError::TooLong {
                    title: track.title(),
                    duration,
                    max: self.config.max_song_duration,
                });
            }
        }
        let source_url = track
            .source_url()
            .ok_or_else(|| PlayerError::NotFound(track.request_url().to_string()))?;

        Ok(self.sink.play(&source_url, &self.config.reconnect).await?)
    }

    /// Saca el track fallido y deja elegido el siguiente, si lo hay
    fn fail(&self, state: &mut SessionState, track: &Arc<Track>) -> Option<(Arc<Track>, u64)> {
        state.playlist.remove_by_id(track.id());
        state.playlist.set_loop(false);
        state.current = None;

        match state.playlist.advance() {
            Some(next) => {
                let ticket = self.begin(state, next.clone());
                Some((next, ticket))
            }
            None => {
                self.publish(state, PlayerState::Idle);
                None
            }
        }
    }

    fn spawn_waiter(&self, ticket: u64, completion: Completion) {
        let session = self.me.clone();
        tokio::spawn(async move {
            let error = completion.wait().await;
            if let Some(session) = session.upgrade() {
                session.on_track_finished(ticket, error).await;
            }
        });
    }

    /// Fin de un track: natural, por `skip`/`stop` o por error de la salida
    pub(crate) async fn on_track_finished(&self, ticket: u64, error: Option<SinkError>) {
        let (handle, next) = {
            let mut state = self.state.lock().await;
            if state.closed || state.epoch != ticket {
                debug!("🚫 Finalización obsoleta ignorada (ticket {})", ticket);
                return;
            }

            if let Some(e) = &error {
                warn!("⚠️ Error de reproducción en {}: {}", self.tenant, e);
            }
            state.current = None;
            self.publish(&mut state, PlayerState::Idle);
            let handle = state.now_playing.take();

            let next = state
                .playlist
                .advance()
                .map(|track| {
                    let ticket = self.begin(&mut state, track.clone());
                    (track, ticket)
                });
            if next.is_none() {
                info!("📭 Cola terminada en {}", self.tenant);
                self.reset_watchdog();
            }
            (handle, next)
        };

        if let Some(handle) = handle {
            self.delete_message(handle).await;
        }
        if let Some((track, ticket)) = next {
            if let Err(e) = self.launch(track, ticket).await {
                warn!("⚠️ Error al continuar la cola de {}: {}", self.tenant, e);
            }
        }
    }

    fn preload(&self, state: &SessionState) {
        let upcoming = state.playlist.upcoming(self.config.max_preload);
        self.preloader.schedule(upcoming);
    }

    async fn delete_message(&self, handle: MessageHandle) {
        if let Err(e) = self.notifier.delete(self.tenant, handle).await {
            debug!("No se pudo borrar el mensaje {:?}: {}", handle, e);
        }
    }

    // ── Watchdog y cierre ───────────────────────────────────────────────

    fn reset_watchdog(&self) {
        let session = self.me.clone();
        self.watchdog.arm(self.config.idle_timeout, move |generation| async move {
            if let Some(session) = session.upgrade() {
                session.on_watchdog(generation).await;
            }
        });
    }

    async fn on_watchdog(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.closed || !self.watchdog.is_current(generation) {
            return;
        }

        let listeners = self.sink.listeners().await;
        let idle = state.current.is_none() && state.playlist.is_empty();

        if listeners == 0 {
            info!("💤 Canal vacío en {}, cerrando sesión", self.tenant);
        } else if self.config.leave_when_idle && idle {
            info!("💤 Sin actividad en {}, cerrando sesión", self.tenant);
        } else {
            debug!("⏰ {} oyentes en {}, watchdog rearmado", listeners, self.tenant);
            self.reset_watchdog();
            return;
        }

        let handle = self.close(&mut state);
        drop(state);
        self.finish_teardown(handle).await;
    }

    /// Cierra la sesión; idempotente. Los comandos posteriores devuelven `SessionClosed`
    pub async fn teardown(&self) {
        let handle = {
            let mut state = self.state.lock().await;
            if state.closed {
                return;
            }
            self.close(&mut state)
        };
        self.finish_teardown(handle).await;
    }

    fn close(&self, state: &mut SessionState) -> Option<MessageHandle> {
        state.closed = true;
        self.watchdog.cancel();
        state.playlist.clear();
        state.playlist.set_loop(false);
        state.current = None;
        state.epoch += 1;
        self.publish(state, PlayerState::Stopped);
        // Fuera del registro antes de esperar a la salida o al notifier
        if let Some(registry) = self.registry.upgrade() {
            registry.evict(self.tenant, self);
        }
        state.now_playing.take()
    }

    async fn finish_teardown(&self, handle: Option<MessageHandle>) {
        self.sink.stop().await;
        self.sink.disconnect().await;
        if let Some(handle) = handle {
            self.delete_message(handle).await;
        }
        info!("👋 Sesión de {} cerrada", self.tenant);
    }
}
