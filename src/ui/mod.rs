//! # UI Module
//!
//! Platform-neutral message payloads and the [`Notifier`] port that a chat
//! layer implements to show them.
//!
//! - [`embeds`] builds the now-playing and queue listing payloads
//! - [`console`] is the stdout notifier used by the binary

pub mod console;
pub mod embeds;

use async_trait::async_trait;

use crate::audio::registry::TenantId;

pub use console::ConsoleNotifier;
pub use embeds::{format_duration, ListingEntry, NowPlaying, QueueListing};

/// Referencia opaca a un mensaje publicado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub u64);

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    #[error("message {0:?} not found")]
    MessageNotFound(MessageHandle),
}

/// Canal de mensajes hacia los usuarios de un tenant
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_now_playing(
        &self,
        tenant: TenantId,
        message: &NowPlaying,
    ) -> Result<MessageHandle, NotifyError>;

    /// Best-effort; el llamador ignora los errores
    async fn delete(&self, tenant: TenantId, handle: MessageHandle) -> Result<(), NotifyError>;

    async fn send_queue_listing(
        &self,
        tenant: TenantId,
        listing: &QueueListing,
    ) -> Result<MessageHandle, NotifyError>;
}
