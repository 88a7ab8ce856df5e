use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::error::{PlayerError, Result};

/// Tipo de request que envía el usuario
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Texto libre sin esquema
    Search(String),
    /// Link a un único item
    Url(String),
    /// Playlist de YouTube, opcionalmente desde una posición
    Playlist { list_id: String, start: usize },
}

impl RequestKind {
    /// Clasifica un request; los mixes generados (`list=RD...`) se rechazan
    pub fn classify(request: &str) -> Result<Self> {
        let request = request.trim();
        if request.is_empty() {
            return Err(PlayerError::NotFound(String::new()));
        }

        let parsed = match Url::parse(request) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(_) | Err(_) => return Ok(Self::Search(request.to_string())),
        };

        if !is_youtube_url(request) {
            return Ok(Self::Url(request.to_string()));
        }

        let mut list_id = None;
        let mut start = 0;
        for (key, value) in parsed.query_pairs() {
            // youtu.be a veces entrega la clave deformada ("?list" dentro de otra clave)
            if key == "list" || (list_id.is_none() && key.contains("list")) {
                list_id = Some(value.to_string());
            } else if key == "index" {
                start = value.parse().unwrap_or(0);
            }
        }

        match list_id {
            Some(id) if id.starts_with("RD") => Err(PlayerError::RadioNotAllowed),
            Some(id) if !id.is_empty() => Ok(Self::Playlist { list_id: id, start }),
            _ => Ok(Self::Url(request.to_string())),
        }
    }

    /// URL canónica de una playlist para el backend
    pub fn playlist_url(list_id: &str) -> String {
        format!("https://www.youtube.com/playlist?list={}", list_id)
    }
}

/// Verifica si una URL es de YouTube
pub fn is_youtube_url(url: &str) -> bool {
    static YOUTUBE: OnceLock<Regex> = OnceLock::new();
    YOUTUBE
        .get_or_init(|| {
            Regex::new(r"^(https?://)?(www\.|m\.|music\.)?(youtube\.com/|youtu\.be/)")
                .expect("valid youtube regex")
        })
        .is_match(url)
}
