//! `actiond` – Action proxy daemon.

use std::env;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use action_proxy::runtime::dispatcher::Dispatcher;
use action_proxy::runtime::lifecycle::LifecycleController;
use action_proxy::runtime::loader::DylibLoader;
use action_proxy::runtime::markers::MarkerWriter;
use action_proxy::service::{ProxyState, router};
use action_proxy::{ProxyConfig, VERSION};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr: stdout belongs to the activation transcript the
    // orchestrator parses.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = ProxyConfig::from_env();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                let port = args
                    .next()
                    .context("--port requires a port number argument")?;
                config.port = port
                    .parse()
                    .with_context(|| format!("invalid port: {port}"))?;
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                anyhow::bail!("invalid command-line argument");
            }
        }
    }

    let state = ProxyState {
        controller: Arc::new(LifecycleController::new(Arc::new(DylibLoader::new()))),
        dispatcher: Arc::new(Dispatcher::from_config(&config)),
        markers: MarkerWriter::stdout(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        version = VERSION,
        %addr,
        allow_concurrent = config.allow_concurrent,
        workers = config.effective_workers(),
        "action proxy listening"
    );

    axum::serve(listener, router(state))
        .await
        .context("control surface terminated")?;

    Ok(())
}

fn print_usage() {
    eprintln!(
        "Usage: actiond [--port PORT]\n\
         \n\
         Options:\n\
           --port PORT  Control surface port (default: 8080)\n\
         \n\
         Environment:\n\
           __OW_ALLOW_CONCURRENT=true  Enable concurrent activations\n\
           RUST_LOG                    Tracing filter (default: info)\n"
    );
}
