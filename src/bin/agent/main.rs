mod brain;
mod dom;
mod face;
mod hands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenvy::dotenv;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voice_cart::transport::{self, Bridge, Envelope};
use voice_cart::{Assistant, AssistantConfig, SelectorRegistry};

use brain::LlmInterpreter;
use dom::ChromePage;
use hands::{BrowserSession, LaunchConfig};

#[derive(Parser, Debug)]
#[command(name = "agent", about = "Shop a storefront by voice")]
struct Cli {
    /// First port tried for the voice UI.
    #[arg(long, env = "VOICE_CART_PORT", default_value_t = 3000)]
    port: u16,

    /// Storefront opened at startup.
    #[arg(long, env = "VOICE_CART_STORE_URL")]
    store_url: Option<String>,

    /// Attach to a running Chrome instead of launching one, e.g. http://127.0.0.1:9222.
    #[arg(long, env = "VOICE_CART_CHROME_URL")]
    chrome_url: Option<String>,

    #[arg(long)]
    headless: bool,

    /// Timing and selector overrides.
    #[arg(long, env = "VOICE_CART_CONFIG", default_value = "voice-cart.json")]
    config: PathBuf,

    #[arg(long, env = "VOICE_CART_MODEL", default_value = brain::DEFAULT_MODEL)]
    model: String,

    #[arg(long, env = "VOICE_CART_API_BASE", default_value = brain::DEFAULT_API_BASE)]
    api_base: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("voice_cart=info,agent=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AssistantConfig::load(&cli.config)?;
    let registry = Arc::new(SelectorRegistry::with_overrides(&config.selectors));
    let timings = Arc::new(config.timings);
    let interpreter = Arc::new(LlmInterpreter::from_env(&cli.api_base, &cli.model)?);

    // The UI comes up before Chrome so the shopper sees something immediately.
    let (transport, mut listener) = transport::channel(8);
    let events = face::start_server(cli.port, Bridge::new(transport, timings.transport_timeout())).await?;

    info!("launching Chrome");
    let launch = LaunchConfig {
        chrome_url: cli.chrome_url,
        headless: cli.headless,
        store_url: cli.store_url,
    };
    let session = tokio::task::spawn_blocking(move || BrowserSession::launch(&launch))
        .await
        .map_err(|e| anyhow!("browser launch panicked: {e}"))??;
    let page = Arc::new(ChromePage::new(session.tab.clone()));
    info!("ready for commands");
    let _ = events.send(face::AgentEvent::Ready);

    // One request at a time: the page is shared and actions must not interleave.
    while let Some(incoming) = listener.recv().await {
        if incoming.is_abandoned() {
            warn!(kind = ?incoming.envelope.kind, "skipping a request nobody is waiting for");
            continue;
        }
        let page = Arc::clone(&page);
        let registry = Arc::clone(&registry);
        let timings = Arc::clone(&timings);
        let interpreter = Arc::clone(&interpreter);
        let envelope = incoming.envelope.clone();
        let handle = Handle::current();

        let reply = tokio::task::spawn_blocking(move || {
            let assistant = Assistant::new(&*page, &registry, &timings, &*interpreter);
            handle.block_on(assistant.handle_envelope(envelope))
        })
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "request handler panicked");
            Envelope::error(format!("the agent failed while handling the request: {e}"))
        });
        incoming.respond(reply);
    }

    drop(session);
    Ok(())
}
