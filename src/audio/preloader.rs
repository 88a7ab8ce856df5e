use dashmap::DashSet;
use std::sync::Arc;
use tokio::{sync::Semaphore, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    cache::MetadataCache,
    error::Result,
    sources::{Resolver, Track, TrackId},
};

/// Background metadata resolution shared by every session.
///
/// Work runs on a pool bounded by a semaphore; a track already being
/// resolved is never scheduled twice. Both the pool and the play path go
/// through [`Preloader::resolve`], which holds the track's own lock, so a
/// play that races a preload waits for it instead of hitting the resolver
/// again.
#[derive(Clone)]
pub struct Preloader {
    resolver: Arc<dyn Resolver>,
    cache: MetadataCache,
    workers: Arc<Semaphore>,
    inflight: Arc<DashSet<TrackId>>,
}

impl Preloader {
    pub fn new(resolver: Arc<dyn Resolver>, cache: MetadataCache, workers: usize) -> Self {
        info!(
            "⚡ Preloader con {} workers usando {}",
            workers.max(1),
            resolver.source_name()
        );
        Self {
            resolver,
            cache,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            inflight: Arc::new(DashSet::new()),
        }
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Resuelve la metadata de un track si todavía no la tiene
    pub async fn resolve(&self, track: &Arc<Track>) -> Result<()> {
        if track.is_resolved() {
            return Ok(());
        }

        let _guard = track.resolution_guard().await;
        // Otro resolvió mientras esperábamos el candado
        if track.is_resolved() {
            return Ok(());
        }

        let key = track.lookup_url();
        if let Some(info) = self.cache.get(&key) {
            debug!("💾 Metadata desde cache: {}", key);
            track.apply(info);
            return Ok(());
        }

        let info = self.resolver.resolve_metadata(track).await?;
        self.cache.put(key, info.clone());
        track.apply(info);
        debug!("✅ Track resuelto: {}", track.title());
        Ok(())
    }

    /// Programa la resolución en segundo plano de los tracks pendientes
    pub fn schedule(&self, tracks: Vec<Arc<Track>>) -> Vec<JoinHandle<()>> {
        tracks
            .into_iter()
            .filter(|track| !track.is_resolved())
            .filter(|track| self.inflight.insert(track.id()))
            .map(|track| {
                let this = self.clone();
                tokio::spawn(async move {
                    match this.workers.clone().acquire_owned().await {
                        Ok(_permit) => {
                            if let Err(e) = this.resolve(&track).await {
                                warn!("⚠️ Precarga fallida para {}: {}", track.title(), e);
                            }
                        }
                        Err(e) => warn!("⚠️ Pool de precarga cerrado: {}", e),
                    }
                    this.inflight.remove(&track.id());
                })
            })
            .collect()
    }

    pub fn is_inflight(&self, id: TrackId) -> bool {
        self.inflight.contains(&id)
    }
}
