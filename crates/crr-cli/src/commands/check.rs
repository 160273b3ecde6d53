use anyhow::Result;
use colored::Colorize;
use crr_config::ReplicationFile;

use crate::runner;

pub async fn cmd_check(config: ReplicationFile) -> Result<()> {
    let bootstrap = runner::bootstrap(&config).await?;

    println!("\n{}\n", "Replication task is ready.".green().bold());
    print!("{}", bootstrap.worker);
    println!();
    Ok(())
}
