use std::net::SocketAddr;

use clap::Parser;
use tracing::info;

use gateway::config::Config;
use gateway::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "gateway", about = "Entrega real-time gateway")]
struct Args {
    /// Config file name (without extension), e.g. `gateway`
    #[arg(long)]
    config: Option<String>,

    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::logging::init("info");

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let bind_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(config);
    let audit_task = state.audit.spawn_drain();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(common::shutdown::wait_for_shutdown())
        .await?;

    audit_task.abort();
    info!("gateway stopped");
    Ok(())
}
