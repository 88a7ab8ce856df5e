use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{Descriptor, RequestKind, Resolved, Resolver, Track, TrackInfo};
use crate::error::{PlayerError, Result};

/// Cliente para resolver requests con yt-dlp
pub struct YtDlpResolver {
    binary: PathBuf,
    max_playlist_len: usize,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (`--dump-json`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    thumbnails: Option<Vec<Thumbnail>>,
    webpage_url: Option<String>,
    url: Option<String>,
    #[serde(default)]
    is_live: Option<bool>,
    /// Presente en entradas planas de playlist
    #[serde(default)]
    ie_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<PathBuf>, max_playlist_len: usize) -> Self {
        Self {
            binary: binary.into(),
            max_playlist_len,
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Ejecuta yt-dlp y devuelve stdout
    async fn run(&self, args: &[&str]) -> Result<String> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| PlayerError::Upstream(e.to_string()))?;

        debug!("🔧 yt-dlp {}", args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| PlayerError::Upstream(format!("Error al ejecutar yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_stderr(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn single(&self, target: &str) -> Result<Descriptor> {
        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "-f",
                "bestaudio/best",
                "--no-warnings",
                target,
            ])
            .await?;

        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| PlayerError::NotFound(target.to_string()))?;
        let descriptor = parse_line(line, target)?;
        Ok(descriptor)
    }

    async fn playlist(&self, list_id: &str, start: usize) -> Result<Vec<Result<Descriptor>>> {
        let url = RequestKind::playlist_url(list_id);
        let first = start.max(1);
        // +1 para detectar que la playlist supera el límite
        let last = first + self.max_playlist_len;
        let (first, last) = (first.to_string(), last.to_string());

        info!("📋 Obteniendo playlist: {}", url);

        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-json",
                "--playlist-start",
                &first,
                "--playlist-end",
                &last,
                "--no-warnings",
                &url,
            ])
            .await?;

        let entries: Vec<_> = stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| parse_line(line, &url))
            .collect();

        if entries.is_empty() {
            return Err(PlayerError::NotFound(url));
        }
        Ok(entries)
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve_request(&self, request: &str) -> Result<Resolved> {
        match RequestKind::classify(request)? {
            RequestKind::Search(query) => {
                info!("🔍 Buscando: {}", query);
                let search = format!("ytsearch1:{}", query);
                Ok(Resolved::Single(self.single(&search).await?))
            }
            RequestKind::Url(url) => Ok(Resolved::Single(self.single(&url).await?)),
            RequestKind::Playlist { list_id, start } => {
                Ok(Resolved::Playlist(self.playlist(&list_id, start).await?))
            }
        }
    }

    async fn resolve_metadata(&self, track: &Track) -> Result<TrackInfo> {
        let target = track.lookup_url();
        debug!("📊 Resolviendo metadata de: {}", target);

        let descriptor = self.single(&target).await?;
        if descriptor.info.source_url.is_none() {
            return Err(PlayerError::NotFound(target));
        }
        Ok(descriptor.info)
    }

    fn source_name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Convierte una línea JSON de yt-dlp en descriptor
fn parse_line(line: &str, fallback_url: &str) -> Result<Descriptor> {
    let info: YtDlpInfo = serde_json::from_str(line)
        .map_err(|e| PlayerError::Upstream(format!("Error al parsear respuesta de yt-dlp: {}", e)))?;

    let title = info.title.clone().unwrap_or_default();
    if is_restricted_title(&title) {
        return Err(PlayerError::RestrictedContent(title));
    }

    if info.is_live.unwrap_or(false) {
        warn!("🔴 Stream en vivo sin duración: {}", title);
    }

    let thumbnail = info
        .thumbnails
        .as_ref()
        .and_then(|list| list.last())
        .map(|t| t.url.clone())
        .or(info.thumbnail);

    // En entradas planas `url` es la página, no el stream
    let is_flat = info.ie_key.is_some();
    let webpage_url = info.webpage_url.clone().or_else(|| {
        if is_flat {
            info.url.clone()
        } else {
            None
        }
    });
    let source_url = if is_flat { None } else { info.url };

    let request_url = webpage_url
        .clone()
        .or_else(|| {
            info.id
                .as_ref()
                .map(|id| format!("https://www.youtube.com/watch?v={}", id))
        })
        .unwrap_or_else(|| fallback_url.to_string());

    Ok(Descriptor::new(
        request_url,
        TrackInfo {
            title: info.title,
            uploader: info.uploader,
            duration: info.duration.map(Duration::from_secs_f64),
            source_url,
            thumbnail,
            webpage_url,
        },
    ))
}

fn is_restricted_title(title: &str) -> bool {
    matches!(title, "[Private video]" | "[Deleted video]" | "[Unavailable video]")
}

/// Clasifica el stderr de yt-dlp en la taxonomía de errores
fn classify_stderr(stderr: &str) -> PlayerError {
    let lower = stderr.to_lowercase();
    let reason = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("yt-dlp failed")
        .trim()
        .to_string();

    if lower.contains("private video")
        || lower.contains("blocked it in your country")
        || lower.contains("not available in your country")
        || lower.contains("sign in to confirm your age")
        || lower.contains("members-only")
    {
        PlayerError::RestrictedContent(reason)
    } else if lower.contains("video unavailable")
        || lower.contains("incomplete youtube id")
        || lower.contains("is not a valid url")
        || lower.contains("no video results")
        || lower.contains("unsupported url")
    {
        PlayerError::NotFound(reason)
    } else {
        PlayerError::Upstream(reason)
    }
}
