use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt, str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    error::{PlayerError, Result},
    sources::{Track, TrackId},
};

/// Qué hacer cuando un track ya presente en el historial vuelve a sonar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// El track se mueve al frente; cada id aparece una sola vez
    #[default]
    Dedupe,
    /// Se registra cada reproducción; `previous` usa la más reciente
    KeepAll,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown history policy '{0}' (expected 'dedupe' or 'keep_all')")]
pub struct UnknownHistoryPolicy(String);

impl FromStr for HistoryPolicy {
    type Err = UnknownHistoryPolicy;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dedupe" => Ok(Self::Dedupe),
            "keep_all" | "keepall" => Ok(Self::KeepAll),
            other => Err(UnknownHistoryPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    Queue,
    History,
}

impl fmt::Display for PageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSource::Queue => f.write_str("Playlist"),
            PageSource::History => f.write_str("Recently played"),
        }
    }
}

/// Una ventana de la cola o del historial
#[derive(Debug, Clone)]
pub struct Page {
    pub source: PageSource,
    pub items: Vec<Arc<Track>>,
    /// Página mostrada, empezando en 0
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub page_size: usize,
    /// Suma de las duraciones conocidas de toda la lista, no solo de la página
    pub total_duration: Duration,
}

impl Page {
    /// Posición (1-based) del primer item de la página
    pub fn first_position(&self) -> usize {
        self.page * self.page_size + 1
    }
}

/// Queue and bounded history of one session.
///
/// Pure data structure: no I/O and no locking, the session serializes access.
/// `queue` is FIFO with the next track at the front; `history` is
/// most-recent-first.
#[derive(Debug)]
pub struct Playlist {
    queue: VecDeque<Arc<Track>>,
    history: VecDeque<Arc<Track>>,
    looping: bool,
    max_history: usize,
    policy: HistoryPolicy,
}

impl Playlist {
    pub fn new(max_history: usize, policy: HistoryPolicy) -> Self {
        Self {
            queue: VecDeque::new(),
            history: VecDeque::new(),
            looping: false,
            max_history: max_history.max(1),
            policy,
        }
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&mut self, track: Arc<Track>) {
        debug!("➕ Agregado a la cola: {}", track.title());
        self.queue.push_back(track);
    }

    /// Selects the next track without popping it.
    ///
    /// With loop on, the most recent history entry goes back to the head of
    /// the queue first, so the track that just finished plays again. Callers
    /// must start playback (which pops) before calling `advance` again.
    pub fn advance(&mut self) -> Option<Arc<Track>> {
        if self.looping {
            if let Some(last) = self.history.front().cloned() {
                debug!("🔂 Repitiendo track: {}", last.title());
                self.queue.push_front(last);
            }
        }
        self.truncate_history();
        self.queue.front().cloned()
    }

    /// Reordena la cola para volver al track anterior.
    ///
    /// Un track que ya estaba en la cola se mueve en vez de duplicarse.
    pub fn previous(&mut self, current: Option<&Arc<Track>>) -> Option<Arc<Track>> {
        match current {
            None => {
                let last = self.history.front().cloned()?;
                self.remove_by_id(last.id());
                self.queue.push_front(last.clone());
                Some(last)
            }
            Some(current) => {
                let position = self.history.iter().position(|t| t.id() == current.id())?;
                let predecessor = self.history.get(position + 1).cloned()?;
                self.remove_by_id(predecessor.id());
                self.remove_by_id(current.id());
                self.queue.push_front(predecessor.clone());
                self.queue.insert(1, current.clone());
                Some(predecessor)
            }
        }
    }

    /// Elimina un track de la cola por posición (0-based)
    pub fn remove_at(&mut self, index: usize) -> Result<Arc<Track>> {
        let len = self.queue.len();
        let track = self
            .queue
            .remove(index)
            .ok_or(PlayerError::IndexOutOfRange { index, len })?;
        debug!("❌ Track eliminado en posición {}", index);
        Ok(track)
    }

    pub fn remove_by_id(&mut self, id: TrackId) -> Option<Arc<Track>> {
        let index = self.queue.iter().position(|t| t.id() == id)?;
        self.queue.remove(index)
    }

    /// Mezcla la cola
    pub fn shuffle(&mut self) {
        let mut items: Vec<_> = self.queue.drain(..).collect();
        items.shuffle(&mut rand::thread_rng());
        self.queue.extend(items);
        info!("🔀 Cola mezclada");
    }

    /// Limpia la cola (el historial se conserva)
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Saca el frente de la cola si es el track indicado
    pub fn pop_front_if(&mut self, id: TrackId) -> Option<Arc<Track>> {
        if self.queue.front().map(|t| t.id()) == Some(id) {
            self.queue.pop_front()
        } else {
            None
        }
    }

    /// Registra un track que empezó a sonar
    pub fn push_history(&mut self, track: Arc<Track>) {
        if self.policy == HistoryPolicy::Dedupe {
            self.history.retain(|t| t.id() != track.id());
        }
        self.history.push_front(track);
        self.truncate_history();
    }

    /// Ventana de precarga: los primeros `n` de la cola
    pub fn upcoming(&self, n: usize) -> Vec<Arc<Track>> {
        self.queue.iter().take(n).cloned().collect()
    }

    pub fn page(&self, source: PageSource, page: Option<usize>, page_size: usize) -> Page {
        let page_size = page_size.max(1);
        let list = match source {
            PageSource::Queue => &self.queue,
            PageSource::History => &self.history,
        };
        let total_items = list.len();
        let total_pages = total_items.div_ceil(page_size);

        let page = match (source, page) {
            (_, Some(p)) if p < total_pages => p,
            (PageSource::Queue, _) => 0,
            (PageSource::History, _) => total_pages.saturating_sub(1),
        };

        Page {
            source,
            items: list
                .iter()
                .skip(page * page_size)
                .take(page_size)
                .cloned()
                .collect(),
            page,
            total_pages,
            total_items,
            page_size,
            total_duration: list.iter().filter_map(|t| t.duration()).sum(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queue(&self) -> impl Iterator<Item = &Arc<Track>> {
        self.queue.iter()
    }

    pub fn history(&self) -> impl Iterator<Item = &Arc<Track>> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.looping = enabled;
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.looping = !self.looping;
        self.looping
    }

    fn truncate_history(&mut self) {
        while self.history.len() > self.max_history {
            self.history.pop_back();
        }
    }
}
