use std::sync::Arc;
use tracing::{debug, info, warn};

use super::commands::{parse, Command, Invocation, HELP};
use crate::{
    audio::{EnqueueReport, Registry, TenantId},
    error::PlayerError,
    sources::{admission::ExclusionReason, Requester},
    ui::format_duration,
};

/// Qué hacer después de una línea
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    /// La respuesta ya salió por el notifier
    Silent,
    Quit,
}

/// Front-end de texto sobre el registry
pub struct Console {
    registry: Arc<Registry>,
    tenant: TenantId,
    requester: Requester,
}

impl Console {
    pub fn new(registry: Arc<Registry>, tenant: TenantId, requester: Requester) -> Self {
        Self {
            registry,
            tenant,
            requester,
        }
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    /// Interpreta y ejecuta una línea
    pub async fn handle_line(&mut self, line: &str) -> Outcome {
        match parse(line) {
            Ok(invocation) => self.handle_command(invocation).await,
            Err(e) => Outcome::Reply(format!("❌ {}", e)),
        }
    }

    pub async fn handle_command(&mut self, invocation: Invocation) -> Outcome {
        let tenant = invocation.tenant.unwrap_or(self.tenant);
        info!(
            "📝 Comando {:?} usado por {} en {}",
            invocation.command, self.requester, tenant
        );

        let result = match invocation.command {
            Command::Help => Ok(Outcome::Reply(HELP.to_string())),
            Command::Quit => Ok(Outcome::Quit),
            Command::Use(next) => {
                self.tenant = next;
                Ok(Outcome::Reply(format!("🎯 Tenant por defecto: {}", next)))
            }
            Command::Sessions => Ok(handle_sessions(&self.registry)),
            Command::Leave => Ok(handle_leave(&self.registry, tenant).await),
            command => match self.handle_session_command(tenant, command.clone()).await {
                // La sesión se cerró entre la búsqueda y el comando
                Err(e) if e.is_session_fatal() => {
                    debug!("🔄 Reintentando en una sesión nueva de {}", tenant);
                    self.handle_session_command(tenant, command).await
                }
                other => other,
            },
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                if !matches!(
                    e,
                    PlayerError::EmptyQueue
                        | PlayerError::EmptyHistory
                        | PlayerError::NothingPlaying
                        | PlayerError::IndexOutOfRange { .. }
                ) {
                    warn!("⚠️ Comando falló en {}: {}", tenant, e);
                }
                Outcome::Reply(format!("❌ {}", e.user_message()))
            }
        }
    }

    async fn handle_session_command(
        &self,
        tenant: TenantId,
        command: Command,
    ) -> Result<Outcome, PlayerError> {
        let session = self.registry.get_or_create(tenant);

        let reply = match command {
            Command::Play(query) => {
                let report = session.enqueue(&query, self.requester.clone()).await?;
                describe_enqueue(&report)
            }
            Command::Skip => {
                session.skip().await?;
                "⏭️ Saltado".to_string()
            }
            Command::Next => {
                session.next().await?;
                "⏭️ Siguiente".to_string()
            }
            Command::Prev => {
                session.prev().await?;
                "⏮️ Anterior".to_string()
            }
            Command::Pause => {
                session.pause().await?;
                "⏸️ Pausado".to_string()
            }
            Command::Resume => {
                session.resume().await?;
                "▶️ Reanudado".to_string()
            }
            Command::Stop => {
                session.stop().await?;
                "⏹️ Detenido".to_string()
            }
            Command::Shuffle => {
                session.shuffle().await?;
                "🔀 Cola mezclada".to_string()
            }
            Command::Loop => {
                if session.toggle_loop().await? {
                    "🔁 Loop activado".to_string()
                } else {
                    "➡️ Loop desactivado".to_string()
                }
            }
            Command::Clear => {
                let removed = session.clear().await?;
                format!("🗑️ Cola vaciada ({} tracks)", removed)
            }
            Command::Queue(page) => {
                session.show_queue(page).await?;
                return Ok(Outcome::Silent);
            }
            Command::History(page) => {
                session.show_history(page).await?;
                return Ok(Outcome::Silent);
            }
            Command::Remove(index) => {
                let removed = session.remove(index).await?;
                format!("❌ Eliminado: {}", removed.title)
            }
            Command::NowPlaying => match session.now_playing().await? {
                Some(message) => message.render(),
                None => return Err(PlayerError::NothingPlaying),
            },
            Command::Help
            | Command::Quit
            | Command::Use(_)
            | Command::Sessions
            | Command::Leave => return Ok(Outcome::Silent),
        };

        Ok(Outcome::Reply(reply))
    }
}

fn handle_sessions(registry: &Registry) -> Outcome {
    let tenants = registry.tenants();
    if tenants.is_empty() {
        return Outcome::Reply("📭 No hay sesiones abiertas".to_string());
    }
    let list: Vec<String> = tenants.iter().map(|t| t.to_string()).collect();
    Outcome::Reply(format!("🎧 Sesiones: {}", list.join(", ")))
}

async fn handle_leave(registry: &Registry, tenant: TenantId) -> Outcome {
    if registry.remove(tenant).await {
        Outcome::Reply(format!("👋 Sesión de {} cerrada", tenant))
    } else {
        Outcome::Reply(format!("❌ {} no tiene sesión abierta", tenant))
    }
}

fn describe_enqueue(report: &EnqueueReport) -> String {
    let mut lines = Vec::new();
    match report.added.as_slice() {
        [] => lines.push("📭 No se agregó nada".to_string()),
        [title] => lines.push(format!("➕ Agregado: {}", title)),
        titles => lines.push(format!("➕ {} tracks agregados", titles.len())),
    }

    for exclusion in &report.excluded {
        let reason = match &exclusion.reason {
            ExclusionReason::TooLong(duration) => format!("dura {}", format_duration(*duration)),
            ExclusionReason::Restricted => "contenido restringido".to_string(),
        };
        lines.push(format!("⚠️ Omitido {} ({})", exclusion.title, reason));
    }

    if report.truncated > 0 {
        lines.push(format!(
            "✂️ {} entradas quedaron fuera por el límite de la playlist",
            report.truncated
        ));
    }

    if let Some(error) = &report.play_error {
        lines.push(format!("❌ {}", error.user_message()));
    }

    lines.join("\n")
}
