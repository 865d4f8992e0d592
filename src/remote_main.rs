use std::{net::SocketAddr, path::PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use onto::{
    remote::{kv::KvStore, router, AppState},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, REMOTE_PREFIX},
        runtime::multi_thread_runtime,
    },
};
use tracing::info;

#[derive(Parser)]
#[command(name = "onto-remote", version)]
#[command(about = "Key-value sync server for onto", long_about = None)]
struct RemoteArgs {
    #[arg(long, default_value = "127.0.0.1:8787")]
    addr: SocketAddr,
    #[arg(long, help = "Storage directory. Defaults to <app dir>/remote-kv")]
    dir: Option<PathBuf>,
    #[arg(long, help = "Shared bearer token clients must present. Falls back to ONTO_API_TOKEN")]
    token: Option<String>,
    #[arg(long = "log-console")]
    log_console: bool,
}

fn main() -> Result<()> {
    let args = RemoteArgs::parse();

    let app_dir = create_application_default_path()?;
    enable_logging(REMOTE_PREFIX, &app_dir, None, args.log_console)?;

    let token = args
        .token
        .or_else(|| std::env::var("ONTO_API_TOKEN").ok());
    let Some(token) = token.filter(|v| !v.is_empty()) else {
        bail!("a token is required; pass --token or set ONTO_API_TOKEN");
    };
    let kv_dir = args.dir.unwrap_or_else(|| app_dir.join("remote-kv"));

    multi_thread_runtime()?.block_on(serve(args.addr, kv_dir, token))
}

async fn serve(addr: SocketAddr, kv_dir: PathBuf, token: String) -> Result<()> {
    let kv = KvStore::new(kv_dir)?;
    let app = router(AppState::new(kv, &token));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
