//! # Sources Module
//!
//! Everything between a user's request string and a playable [`Track`].
//!
//! - [`request`] classifies the raw request (search, link, playlist, mix)
//! - [`admission`] applies the caller-side limits (duration, playlist size)
//! - [`ytdlp`] is the shipped [`Resolver`] backed by the `yt-dlp` binary
//!
//! The resolver is an external collaborator: the session only talks to it
//! through the two operations of the [`Resolver`] trait.

pub mod admission;
pub mod request;
pub mod track;
pub mod ytdlp;

use async_trait::async_trait;

use crate::error::Result;

pub use admission::{admit, Admission, Exclusion, ExclusionReason, Limits};
pub use request::RequestKind;
pub use track::{Requester, Track, TrackId, TrackInfo, TrackSnapshot};
pub use ytdlp::YtDlpResolver;

/// Descriptor de un item devuelto por el resolver, antes de ser un `Track`
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// URL que identifica el item ante el resolver
    pub request_url: String,
    pub info: TrackInfo,
}

impl Descriptor {
    pub fn new(request_url: impl Into<String>, info: TrackInfo) -> Self {
        Self {
            request_url: request_url.into(),
            info,
        }
    }

    pub fn title(&self) -> String {
        self.info
            .title
            .clone()
            .unwrap_or_else(|| self.request_url.clone())
    }

    pub fn into_track(self, requested_by: Requester) -> Track {
        Track::new(self.request_url, requested_by, self.info)
    }
}

/// Resultado de resolver un request
#[derive(Debug, Clone)]
pub enum Resolved {
    Single(Descriptor),
    /// Cada entrada puede fallar por separado (privada, bloqueada...)
    Playlist(Vec<Result<Descriptor>>),
}

/// Contrato del backend de metadata
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Convierte un request en uno o varios descriptores
    async fn resolve_request(&self, request: &str) -> Result<Resolved>;

    /// Completa título, duración y URL de stream de un track
    async fn resolve_metadata(&self, track: &Track) -> Result<TrackInfo>;

    /// Nombre del backend
    fn source_name(&self) -> &'static str;
}
