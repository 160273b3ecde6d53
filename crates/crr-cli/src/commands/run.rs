use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use crr_aws::{PollerSettings, StreamPoller};
use crr_config::ReplicationFile;
use tracing::{info, warn};

use crate::runner::{self, Bootstrap};

pub async fn cmd_run(config: ReplicationFile) -> Result<()> {
    let Bootstrap {
        worker,
        client,
        factory,
    } = runner::bootstrap(&config).await?;

    println!("{}", "Starting replication (Ctrl-C to stop)".green());
    print!("{}", worker);
    info!(
        app_name = %worker.app_name,
        worker_id = %worker.worker_id,
        stream_id = worker.stream.stream_id(),
        "Starting replication worker"
    );

    let poller = StreamPoller::new(Arc::new(client), factory, PollerSettings::from(&worker));
    poller
        .run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl-C, shutting down"),
                Err(e) => {
                    warn!(error = %e, "Unable to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    println!("{}", "Replication stopped.".yellow());
    Ok(())
}
