use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use open_music_queue::{
    audio::{process_sink::FfplaySinkFactory, Preloader, Registry, TenantId},
    cache::MetadataCache,
    config::Config,
    console::{Console, Outcome},
    sources::{Requester, YtDlpResolver},
    ui::{console::ConsoleNotifier, Notifier},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_music_queue=debug".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🎵 Iniciando Open Music Queue v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("⚙️ {}", config.summary());

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    // Inicializar caché de metadata
    let cache = MetadataCache::new(
        config.metadata_cache_size,
        Duration::from_secs(config.metadata_ttl),
    );
    let resolver = Arc::new(YtDlpResolver::new(
        config.ytdlp_path.clone(),
        config.max_playlist_len,
    ));
    let preloader = Preloader::new(resolver, cache.clone(), config.preload_workers);
    let sinks = Arc::new(FfplaySinkFactory::new(
        config.player_path.clone(),
        config.local_listeners,
    ));
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::new());
    let registry = Registry::new(config.session_config(), preloader, sinks, notifier);

    // Limpieza periódica del caché
    {
        let cache = cache.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                cache.cleanup_old_entries();
                let metrics = cache.metrics();
                info!(
                    "💾 Cache: {} entradas, hit rate {:.1}%",
                    cache.len(),
                    metrics.hit_rate() * 100.0
                );
            }
        });
    }

    let mut console = Console::new(
        registry.clone(),
        TenantId(1),
        Requester::new(0, whoami()),
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("🚀 Listo, escribe 'help' para ver los comandos");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match console.handle_line(&line).await {
                        Outcome::Reply(text) => println!("{}", text),
                        Outcome::Silent => {}
                        Outcome::Quit => break,
                    },
                    Ok(None) => break,
                    Err(e) => {
                        error!("❌ Error leyendo stdin: {}", e);
                        break;
                    }
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("⚠️ No se pudo escuchar Ctrl+C: {}", e);
                }
                info!("⚠️ Señal de shutdown recibida, cerrando...");
                break;
            }
        }
    }

    registry.shutdown().await;
    info!("👋 Todas las sesiones cerradas");
    Ok(())
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "console".to_string())
}

async fn health_check(config: &Config) -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new(&config.ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    let player = async_process::Command::new(&config.player_path)
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && player.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
