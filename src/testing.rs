//! In-memory resolver, sink and notifier used by the unit tests.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Semaphore;

use crate::{
    audio::{
        preloader::Preloader,
        registry::{Registry, TenantId},
        session::Session,
        sink::{Completion, CompletionSender, ReconnectPolicy, Sink, SinkError, SinkFactory},
    },
    cache::MetadataCache,
    config::SessionConfig,
    error::{PlayerError, Result},
    sources::{Descriptor, Requester, Resolved, Resolver, Track, TrackInfo},
    ui::{MessageHandle, Notifier, NotifyError, NowPlaying, QueueListing},
};

pub fn page_url(name: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", name)
}

pub fn unresolved_track(name: &str) -> Arc<Track> {
    Arc::new(Track::new(
        page_url(name),
        Requester::new(1, "tester"),
        TrackInfo {
            title: Some(name.to_string()),
            ..TrackInfo::default()
        },
    ))
}

pub fn resolved_info(name: &str, secs: u64) -> TrackInfo {
    TrackInfo {
        title: Some(name.to_string()),
        duration: Some(Duration::from_secs(secs)),
        source_url: Some(format!("https://stream.test/{}", name)),
        webpage_url: Some(page_url(name)),
        ..TrackInfo::default()
    }
}

/// Let spawned tasks run; with paused time the clock only moves once idle
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[derive(Default)]
pub struct FakeResolver {
    requests: Mutex<HashMap<String, Result<Resolved>>>,
    metadata: Mutex<HashMap<String, Result<TrackInfo>>>,
    delay: Option<Duration>,
    gate: Option<Semaphore>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(self, request: &str, resolved: Result<Resolved>) -> Self {
        self.requests.lock().insert(request.to_string(), resolved);
        self
    }

    pub fn with_metadata(self, url: &str, info: Result<TrackInfo>) -> Self {
        self.metadata.lock().insert(url.to_string(), info);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `resolve_metadata` blocks until `release` is called
    pub fn holding(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn metadata_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve_request(&self, request: &str) -> Result<Resolved> {
        if let Some(resolved) = self.requests.lock().get(request) {
            return resolved.clone();
        }
        let name = request.replace(' ', "_");
        Ok(Resolved::Single(Descriptor::new(
            page_url(&name),
            TrackInfo {
                title: Some(request.to_string()),
                ..TrackInfo::default()
            },
        )))
    }

    async fn resolve_metadata(&self, track: &Track) -> Result<TrackInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let url = track.lookup_url();
        if let Some(info) = self.metadata.lock().get(&url) {
            return info.clone();
        }
        let name = url.rsplit('=').next().unwrap_or("track").to_string();
        let mut info = resolved_info(&name, 180);
        info.title = None;
        Ok(info)
    }

    fn source_name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Debug, Default)]
struct FakeSinkState {
    playing: bool,
    paused: bool,
    pending: Option<CompletionSender>,
    played: Vec<String>,
    stops: usize,
    disconnected: bool,
}

/// Sink whose tracks only end when the test says so
#[derive(Debug)]
pub struct FakeSink {
    state: Mutex<FakeSinkState>,
    listeners: AtomicUsize,
    fail_next: Mutex<Option<SinkError>>,
}

impl FakeSink {
    pub fn new(listeners: usize) -> Self {
        Self {
            state: Mutex::new(FakeSinkState::default()),
            listeners: AtomicUsize::new(listeners),
            fail_next: Mutex::new(None),
        }
    }

    /// Termina el track en curso como si se hubiera acabado solo
    pub fn finish(&self, error: Option<SinkError>) -> bool {
        let pending = {
            let mut state = self.state.lock();
            state.playing = false;
            state.paused = false;
            state.pending.take()
        };
        match pending {
            Some(sender) => {
                sender.finish(error);
                true
            }
            None => false,
        }
    }

    pub fn fail_next_play(&self, error: SinkError) {
        *self.fail_next.lock() = Some(error);
    }

    pub fn set_listeners(&self, n: usize) {
        self.listeners.store(n, Ordering::SeqCst);
    }

    pub fn played(&self) -> Vec<String> {
        self.state.lock().played.clone()
    }

    pub fn stops(&self) -> usize {
        self.state.lock().stops
    }

    pub fn is_disconnected(&self) -> bool {
        self.state.lock().disconnected
    }
}

#[async_trait]
impl Sink for FakeSink {
    async fn play(&self, source_url: &str, _policy: &ReconnectPolicy) -> std::result::Result<Completion, SinkError> {
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }
        let (sender, completion) = Completion::channel();
        let previous = {
            let mut state = self.state.lock();
            state.playing = true;
            state.paused = false;
            state.played.push(source_url.to_string());
            state.pending.replace(sender)
        };
        if let Some(previous) = previous {
            previous.finish(None);
        }
        Ok(completion)
    }

    async fn stop(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.stops += 1;
            state.playing = false;
            state.paused = false;
            state.pending.take()
        };
        if let Some(sender) = pending {
            sender.finish(None);
        }
    }

    async fn pause(&self) -> std::result::Result<(), SinkError> {
        let mut state = self.state.lock();
        if !state.playing {
            return Err(SinkError::Rejected("not playing".to_string()));
        }
        state.paused = true;
        Ok(())
    }

    async fn resume(&self) -> std::result::Result<(), SinkError> {
        let mut state = self.state.lock();
        if !state.playing {
            return Err(SinkError::Rejected("not playing".to_string()));
        }
        state.paused = false;
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        let state = self.state.lock();
        state.playing && !state.paused
    }

    async fn is_paused(&self) -> bool {
        let state = self.state.lock();
        state.playing && state.paused
    }

    async fn listeners(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.stop().await;
        self.state.lock().disconnected = true;
    }
}

/// Hands every tenant its own [`FakeSink`] and keeps them reachable
#[derive(Debug)]
pub struct FakeSinkFactory {
    listeners: usize,
    sinks: DashMap<TenantId, Arc<FakeSink>>,
    opened: AtomicUsize,
}

impl FakeSinkFactory {
    pub fn new(listeners: usize) -> Self {
        Self {
            listeners,
            sinks: DashMap::new(),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn sink(&self, tenant: TenantId) -> Option<Arc<FakeSink>> {
        self.sinks.get(&tenant).map(|s| s.clone())
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl SinkFactory for FakeSinkFactory {
    fn open(&self, tenant: TenantId) -> Arc<dyn Sink> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let sink = Arc::new(FakeSink::new(self.listeners));
        self.sinks.insert(tenant, sink.clone());
        sink
    }
}

/// Notifier que solo anota lo que recibe
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    next: AtomicU64,
    now_playing: Mutex<Vec<(TenantId, NowPlaying)>>,
    listings: Mutex<Vec<(TenantId, QueueListing)>>,
    deleted: Mutex<Vec<MessageHandle>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_playing_titles(&self, tenant: TenantId) -> Vec<String> {
        self.now_playing
            .lock()
            .iter()
            .filter(|(t, _)| *t == tenant)
            .map(|(_, np)| np.title.clone())
            .collect()
    }

    pub fn listings(&self) -> Vec<QueueListing> {
        self.listings.lock().iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn deleted(&self) -> Vec<MessageHandle> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_now_playing(
        &self,
        tenant: TenantId,
        message: &NowPlaying,
    ) -> std::result::Result<MessageHandle, NotifyError> {
        self.now_playing.lock().push((tenant, message.clone()));
        Ok(MessageHandle(self.next.fetch_add(1, Ordering::SeqCst)))
    }

    async fn delete(&self, _tenant: TenantId, handle: MessageHandle) -> std::result::Result<(), NotifyError> {
        self.deleted.lock().push(handle);
        Ok(())
    }

    async fn send_queue_listing(
        &self,
        tenant: TenantId,
        listing: &QueueListing,
    ) -> std::result::Result<MessageHandle, NotifyError> {
        self.listings.lock().push((tenant, listing.clone()));
        Ok(MessageHandle(self.next.fetch_add(1, Ordering::SeqCst)))
    }
}

pub fn upstream(reason: &str) -> PlayerError {
    PlayerError::Upstream(reason.to_string())
}

/// Registry wired to fakes
pub struct Harness {
    pub registry: Arc<Registry>,
    pub resolver: Arc<FakeResolver>,
    pub sinks: Arc<FakeSinkFactory>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(resolver: FakeResolver) -> Self {
        Self::with_config(resolver, SessionConfig::default(), 1, None)
    }

    /// `notifier` replaces the recording notifier when given
    pub fn with_config(
        resolver: FakeResolver,
        config: SessionConfig,
        listeners: usize,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        let resolver = Arc::new(resolver);
        let sinks = Arc::new(FakeSinkFactory::new(listeners));
        let recording = Arc::new(RecordingNotifier::new());
        let preloader = Preloader::new(
            resolver.clone(),
            MetadataCache::new(100, Duration::from_secs(3600)),
            2,
        );
        let registry = Registry::new(
            config,
            preloader,
            sinks.clone(),
            notifier.unwrap_or_else(|| recording.clone() as Arc<dyn Notifier>),
        );
        Self {
            registry,
            resolver,
            sinks,
            notifier: recording,
        }
    }

    pub fn session(&self, tenant: u64) -> (Arc<Session>, Arc<FakeSink>) {
        let session = self.registry.get_or_create(TenantId(tenant));
        let sink = self
            .sinks
            .sink(TenantId(tenant))
            .expect("factory opened a sink for the session");
        (session, sink)
    }
}
