use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{MessageHandle, Notifier, NotifyError, NowPlaying, QueueListing};
use crate::audio::registry::TenantId;

/// Imprime los mensajes en stdout, prefijados por tenant
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    next_handle: AtomicU64,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, tenant: TenantId, body: &str) -> MessageHandle {
        let handle = MessageHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        for line in body.lines() {
            println!("[{}] {}", tenant, line);
        }
        handle
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send_now_playing(
        &self,
        tenant: TenantId,
        message: &NowPlaying,
    ) -> Result<MessageHandle, NotifyError> {
        Ok(self.publish(tenant, &message.render()))
    }

    async fn delete(&self, tenant: TenantId, handle: MessageHandle) -> Result<(), NotifyError> {
        // La consola no puede borrar lo ya impreso
        debug!("🗑️ Mensaje {:?} de {} descartado", handle, tenant);
        Ok(())
    }

    async fn send_queue_listing(
        &self,
        tenant: TenantId,
        listing: &QueueListing,
    ) -> Result<MessageHandle, NotifyError> {
        Ok(self.publish(tenant, &listing.render()))
    }
}
