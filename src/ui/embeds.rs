use serde::Serialize;
use std::{fmt::Write as _, time::Duration};

use crate::{
    audio::playlist::{Page, PageSource, Playlist},
    sources::Track,
};

/// Footer estandarizado para todos los mensajes
const STANDARD_FOOTER: &str = "🎵 Open Music";

/// Datos del mensaje "reproduciendo ahora"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlaying {
    pub title: String,
    pub link: String,
    /// `None` para streams sin duración
    pub duration: Option<String>,
    pub requested_by: String,
    pub thumbnail: Option<String>,
    pub looping: bool,
    pub up_next: Vec<String>,
    pub recent: Vec<String>,
}

impl NowPlaying {
    /// Arma el mensaje con las vistas previas de cola e historial
    pub fn new(track: &Track, playlist: &Playlist, queue_preview: usize, history_preview: usize) -> Self {
        let snapshot = track.snapshot();
        Self {
            title: snapshot.title,
            link: snapshot.webpage_url,
            duration: snapshot.duration.map(format_duration),
            requested_by: snapshot.requested_by.to_string(),
            thumbnail: snapshot.thumbnail,
            looping: playlist.is_looping(),
            up_next: playlist
                .queue()
                .take(queue_preview)
                .map(|t| t.title())
                .collect(),
            recent: playlist
                .history()
                .filter(|t| t.id() != track.id())
                .take(history_preview)
                .map(|t| t.title())
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let status = if self.looping { "🔂" } else { "▶️" };
        let _ = writeln!(out, "{} Reproduciendo Ahora: **{}**", status, self.title);
        let _ = writeln!(
            out,
            "⏱️ {} • 👤 {} • 🔗 {}",
            self.duration.as_deref().unwrap_or("🔴 En vivo"),
            self.requested_by,
            self.link
        );

        if !self.up_next.is_empty() {
            let _ = writeln!(out, "Próximas canciones:");
            for (i, title) in self.up_next.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, title);
            }
        }
        if !self.recent.is_empty() {
            let _ = writeln!(out, "Escuchadas recientemente:");
            for title in &self.recent {
                let _ = writeln!(out, "  • {}", title);
            }
        }
        out.push_str(STANDARD_FOOTER);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingEntry {
    /// Posición 1-based dentro de la lista completa
    pub position: usize,
    pub title: String,
    pub duration: Option<String>,
    pub link: String,
}

/// Una página de la cola o del historial lista para mostrar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueListing {
    pub heading: String,
    pub current: Option<String>,
    pub entries: Vec<ListingEntry>,
    /// Página 1-based
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub total_duration: Duration,
}

impl QueueListing {
    pub fn from_page(page: &Page, current: Option<&Track>) -> Self {
        let first = page.first_position();
        Self {
            heading: match page.source {
                PageSource::Queue => "📋 Cola de Reproducción".to_string(),
                PageSource::History => "🕘 Historial".to_string(),
            },
            current: current.map(|t| t.title()),
            entries: page
                .items
                .iter()
                .enumerate()
                .map(|(i, track)| {
                    let snapshot = track.snapshot();
                    ListingEntry {
                        position: first + i,
                        title: snapshot.title,
                        duration: snapshot.duration.map(format_duration),
                        link: snapshot.webpage_url,
                    }
                })
                .collect(),
            page: page.page + 1,
            total_pages: page.total_pages.max(1),
            total_items: page.total_items,
            total_duration: page.total_duration,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.heading);

        if let Some(current) = &self.current {
            let _ = writeln!(out, "▶️ Reproduciendo: **{}**", current);
        }

        if self.entries.is_empty() {
            let _ = writeln!(out, "😴 **La lista está vacía**");
        }
        for entry in &self.entries {
            let duration = entry
                .duration
                .as_ref()
                .map(|d| format!(" `[{}]`", d))
                .unwrap_or_default();
            let _ = writeln!(out, "**{}**. {}{}", entry.position, entry.title, duration);
        }

        let mut info = format!("**Total:** {} canciones", self.total_items);
        if self.total_duration > Duration::ZERO {
            let _ = write!(info, " • **Duración total:** {}", format_duration(self.total_duration));
        }
        let _ = writeln!(out, "{}", info);

        if self.total_pages > 1 {
            let _ = write!(out, "Página {} de {} • Open Music", self.page, self.total_pages);
        } else {
            out.push_str(STANDARD_FOOTER);
        }
        out
    }
}

/// H:MM:SS, o M:SS por debajo de una hora
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
