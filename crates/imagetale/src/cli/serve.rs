//! The `imagetale serve` command: the web UI.

use clap::Args;
use imagetale_core::{Config, Pipeline};

use crate::server;

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (defaults to `[server] host`)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (defaults to `[server] port`)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    // Concurrent uploads must not share artifact paths.
    config.output.per_run_dirs = true;

    let pipeline = Pipeline::from_config(&config)?;
    let max_image_bytes = usize::try_from(config.limits.max_image_bytes()).unwrap_or(usize::MAX);
    let app = server::router(pipeline, max_image_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Imagetale listening on http://{}", listener.local_addr()?);
    tracing::info!("Artifacts under {}", config.output_dir().display());

    server::serve(listener, app).await?;
    Ok(())
}
