use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

/// Identificador estable de un track dentro del proceso
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TrackId(u64);

impl TrackId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Usuario que pidió el track (identidad opaca)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Requester {
    pub id: u64,
    pub name: String,
}

impl Requester {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Metadata de un track, completa o parcial
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<Duration>,
    pub source_url: Option<String>,
    pub thumbnail: Option<String>,
    pub webpage_url: Option<String>,
}

impl TrackInfo {
    pub fn is_resolved(&self) -> bool {
        self.source_url.is_some()
    }

    /// Mezcla `other` sobre `self` sin borrar campos ya conocidos
    fn merge(&mut self, other: TrackInfo) {
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.uploader.is_some() {
            self.uploader = other.uploader;
        }
        if other.duration.is_some() {
            self.duration = other.duration;
        }
        if other.source_url.is_some() {
            self.source_url = other.source_url;
        }
        if other.thumbnail.is_some() {
            self.thumbnail = other.thumbnail;
        }
        if other.webpage_url.is_some() {
            self.webpage_url = other.webpage_url;
        }
    }
}

/// One playable item.
///
/// `id`, `request_url` and `requested_by` are fixed at construction. The
/// metadata sits behind a field-level lock so the preloader can fill it in
/// while the playlist keeps its `Arc<Track>`; `resolved` is derived from the
/// presence of a source URL, so the two can never disagree.
#[derive(Debug)]
pub struct Track {
    id: TrackId,
    request_url: String,
    requested_by: Requester,
    added_at: DateTime<Utc>,
    info: RwLock<TrackInfo>,
    resolving: tokio::sync::Mutex<()>,
}

impl Track {
    pub fn new(request_url: impl Into<String>, requested_by: Requester, info: TrackInfo) -> Self {
        Self {
            id: TrackId::next(),
            request_url: request_url.into(),
            requested_by,
            added_at: Utc::now(),
            info: RwLock::new(info),
            resolving: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    pub fn requested_by(&self) -> &Requester {
        &self.requested_by
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn is_resolved(&self) -> bool {
        self.info.read().is_resolved()
    }

    pub fn info(&self) -> TrackInfo {
        self.info.read().clone()
    }

    pub fn title(&self) -> String {
        self.info
            .read()
            .title
            .clone()
            .unwrap_or_else(|| self.request_url.clone())
    }

    pub fn duration(&self) -> Option<Duration> {
        self.info.read().duration
    }

    pub fn source_url(&self) -> Option<String> {
        self.info.read().source_url.clone()
    }

    /// URL que se pasa al resolver: la página si se conoce, si no el request
    pub fn lookup_url(&self) -> String {
        self.info
            .read()
            .webpage_url
            .clone()
            .unwrap_or_else(|| self.request_url.clone())
    }

    /// Aplica metadata resuelta; nunca toca `id` ni `requested_by`
    pub fn apply(&self, info: TrackInfo) {
        self.info.write().merge(info);
    }

    /// Candado por track que serializa las resoluciones concurrentes
    pub(crate) async fn resolution_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.resolving.lock().await
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        let info = self.info.read();
        TrackSnapshot {
            id: self.id,
            title: info.title.clone().unwrap_or_else(|| self.request_url.clone()),
            uploader: info.uploader.clone(),
            duration: info.duration,
            resolved: info.is_resolved(),
            source_url: info.source_url.clone(),
            thumbnail: info.thumbnail.clone(),
            webpage_url: info
                .webpage_url
                .clone()
                .unwrap_or_else(|| self.request_url.clone()),
            requested_by: self.requested_by.clone(),
            added_at: self.added_at,
        }
    }
}

/// Copia plana de un track para mostrar o comparar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<Duration>,
    pub resolved: bool,
    pub source_url: Option<String>,
    pub thumbnail: Option<String>,
    pub webpage_url: String,
    pub requested_by: Requester,
    pub added_at: DateTime<Utc>,
}
