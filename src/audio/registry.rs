use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{Arc, Weak},
};
use tracing::info;

use super::{preloader::Preloader, session::Session, sink::SinkFactory};
use crate::{config::SessionConfig, ui::Notifier};

/// Identidad opaca de un tenant (guild, sala...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub u64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guild-{}", self.0)
    }
}

/// Owns one [`Session`] per tenant.
///
/// Sessions are created on first touch through `DashMap::entry`, so racing
/// callers for the same tenant all get the same instance. They leave the map
/// only through teardown, which evicts by `Arc` identity: a stale session can
/// never remove the one that replaced it.
pub struct Registry {
    sessions: DashMap<TenantId, Arc<Session>>,
    config: SessionConfig,
    preloader: Preloader,
    sinks: Arc<dyn SinkFactory>,
    notifier: Arc<dyn Notifier>,
    me: Weak<Registry>,
}

impl Registry {
    pub fn new(
        config: SessionConfig,
        preloader: Preloader,
        sinks: Arc<dyn SinkFactory>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            sessions: DashMap::new(),
            config,
            preloader,
            sinks,
            notifier,
            me: me.clone(),
        })
    }

    /// Devuelve la sesión del tenant, creándola si no existe
    pub fn get_or_create(&self, tenant: TenantId) -> Arc<Session> {
        self.sessions
            .entry(tenant)
            .or_insert_with(|| {
                info!("🆕 Nueva sesión para {}", tenant);
                Session::new(
                    tenant,
                    self.config.clone(),
                    self.sinks.open(tenant),
                    self.preloader.clone(),
                    self.notifier.clone(),
                    self.me.clone(),
                )
            })
            .value()
            .clone()
    }

    pub fn get(&self, tenant: TenantId) -> Option<Arc<Session>> {
        self.sessions.get(&tenant).map(|entry| entry.value().clone())
    }

    /// Cierra la sesión del tenant; devuelve `false` si no había ninguna
    pub async fn remove(&self, tenant: TenantId) -> bool {
        match self.get(tenant) {
            Some(session) => {
                session.teardown().await;
                true
            }
            None => false,
        }
    }

    /// Cierra todas las sesiones (apagado del proceso)
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self.sessions.iter().map(|e| e.value().clone()).collect();
        info!("🛑 Cerrando {} sesiones", sessions.len());
        futures::future::join_all(sessions.iter().map(|s| s.teardown())).await;
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<_> = self.sessions.iter().map(|e| *e.key()).collect();
        tenants.sort();
        tenants
    }

    pub(crate) fn evict(&self, tenant: TenantId, session: &Session) {
        let removed = self
            .sessions
            .remove_if(&tenant, |_, current| std::ptr::eq(current.as_ref(), session));
        if removed.is_some() {
            info!("🧹 Sesión de {} eliminada del registro", tenant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sources::Requester,
        testing::{settle, FakeResolver, Harness},
    };
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_touch_creates_one_session_per_tenant() {
        let harness = Harness::new(FakeResolver::new());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let registry = harness.registry.clone();
                tokio::spawn(async move { registry.get_or_create(TenantId(i % 2)) })
            })
            .collect();
        let sessions: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(harness.registry.len(), 2);
        assert_eq!(harness.sinks.opened(), 2);
        for session in &sessions {
            let canonical = harness.registry.get(session.tenant()).unwrap();
            assert!(Arc::ptr_eq(session, &canonical));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn tenants_are_isolated() {
        let harness = Harness::new(FakeResolver::new());

        let play = |tenant: u64, songs: &'static [&'static str]| {
            let registry = harness.registry.clone();
            tokio::spawn(async move {
                let session = registry.get_or_create(TenantId(tenant));
                for song in songs {
                    session
                        .enqueue(song, Requester::new(tenant, "user"))
                        .await
                        .unwrap();
                }
            })
        };
        let (a, b) = tokio::join!(play(1, &["a1", "a2", "a3"]), play(2, &["b1", "b2"]));
        a.unwrap();
        b.unwrap();

        let one = harness.registry.get(TenantId(1)).unwrap().snapshot().await;
        let two = harness.registry.get(TenantId(2)).unwrap().snapshot().await;

        let titles = |snap: &crate::audio::session::SessionSnapshot| {
            let mut all: Vec<String> = snap.current.iter().map(|t| t.title.clone()).collect();
            all.extend(snap.queue.iter().map(|t| t.title.clone()));
            all.extend(snap.history.iter().map(|t| t.title.clone()));
            all
        };
        assert!(titles(&one).iter().all(|t| t.starts_with('a')));
        assert!(titles(&two).iter().all(|t| t.starts_with('b')));
        assert_eq!(one.queue.len(), 2);
        assert_eq!(two.queue.len(), 1);
        assert_eq!(harness.registry.tenants(), vec![TenantId(1), TenantId(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_session_does_not_evict_replacement() {
        let harness = Harness::new(FakeResolver::new());
        let old = harness.registry.get_or_create(TenantId(9));

        assert!(harness.registry.remove(TenantId(9)).await);
        let fresh = harness.registry.get_or_create(TenantId(9));
        assert!(!Arc::ptr_eq(&old, &fresh));

        harness.registry.evict(TenantId(9), &old);
        old.teardown().await;
        settle().await;

        let current = harness.registry.get(TenantId(9)).unwrap();
        assert!(Arc::ptr_eq(&current, &fresh));
        assert!(!harness.registry.remove(TenantId(10)).await);
    }
}
