use tracing::{info, warn};

use nodeseek_checkin::config::Config;
use nodeseek_checkin::{init_logging, runner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging();

    info!("NodeSeek & DeepFlood check-in starting");

    let config = Config::from_env();
    if !config.has_any_credential() {
        warn!("no credentials configured; set NODESEEK_COOKIE or NODESEEK_ACCOUNT");
    }

    let summary = runner::run(&config).await?;

    // Historically this job always exited 0; strict mode makes a fully
    // failed run visible to the host scheduler.
    if config.strict_exit && summary.all_failed() {
        warn!("strict exit enabled and no check-in succeeded");
        std::process::exit(1);
    }

    Ok(())
}
