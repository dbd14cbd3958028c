use anyhow::Result;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chainidx::config::Config;
use chainidx::Indexer;

const RETRY_DELAYS: &[u64] = &[5, 10, 20, 30, 60];
const MAX_RETRY_DELAY: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chainidx=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting chainidx");

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let mut indexer = Indexer::new(config)?;

    run_with_retry(async || indexer.run().await).await
}

/// Restarts the indexer after catastrophic errors (store unavailable after
/// its own internal retries, upstream unavailable after its own internal
/// retries). Transient per-request errors are already handled inside the
/// indexer's own retry tables; this outer loop only fires for failures
/// that made it all the way up.
async fn run_with_retry<F>(mut f: F) -> Result<()>
where
    F: AsyncFnMut() -> chainidx_common::error::Result<()>,
{
    let mut retry_count = 0;
    loop {
        match f().await {
            Ok(()) => {
                retry_count = 0;
            }
            Err(e) => {
                let delay = RETRY_DELAYS.get(retry_count).copied().unwrap_or(MAX_RETRY_DELAY);
                tracing::error!(
                    "fatal error (internal retries exhausted): {e}. restarting in {delay}s (attempt {})",
                    retry_count + 1
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
                retry_count += 1;
            }
        }
    }
}
