use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use common::config::ClientConfig;
use common::store::{FileStore, KeyValueStore, MemoryStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use forum::command::{self, Command, HELP};
use forum::render::render;
use forum::{HttpGateway, SessionStore, ViewController};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout belongs to the rendered view
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = ClientConfig::from_env()?;
    info!("Starting forum client against {}", config.api_url);

    let store: Arc<dyn KeyValueStore> = match &config.session_file {
        Some(path) => {
            info!("Persisting session in {}", path.display());
            Arc::new(FileStore::new(path))
        }
        None => Arc::new(MemoryStore::new()),
    };
    if !store.health_check().await? {
        anyhow::bail!("Session store is not usable");
    }

    let session = SessionStore::new(store);
    if session.restore().await? {
        info!("Resumed previous session");
    }

    let gateway = HttpGateway::from_config(&config, session.clone())?;
    let controller = ViewController::new(Arc::new(gateway), session);
    if let Err(e) = controller.start().await {
        warn!("Could not load threads for the resumed session: {}", e);
    }

    let mut out = std::io::stdout();
    writeln!(out, "{}", render(&controller.state(), Utc::now()))?;
    writeln!(out, "Type `help` for commands.")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let focused = controller.detail().focused().await;
        match command::parse(&line, focused) {
            Ok(Command::Nothing) => continue,
            Ok(Command::Help) => {
                writeln!(out, "{}", HELP)?;
                continue;
            }
            Ok(Command::Quit) => break,
            Ok(Command::Run(intent)) => {
                // failures are already on screen as a notice
                let _ = controller.dispatch(intent).await;
            }
            Err(e) => {
                writeln!(out, "! {}", e)?;
                continue;
            }
        }

        writeln!(out, "{}", render(&controller.state(), Utc::now()))?;
    }

    info!("Forum client exiting");
    Ok(())
}
