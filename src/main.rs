use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uw_engine::{get_underwriting_engine, Config, RatingRequest, Tenant};

const USAGE: &str =
    "usage: uw-engine <rating-request.json> [--prod] [--keep-alive] [--tenant ATTUNE|BLACKBOARD]";

/// Underwrites a single rating request read from a JSON file.
///
/// Prints the log line as JSON on success. Exits with status 2 when the
/// engine produced no result.
#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uw_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut path = None;
    let mut prod = false;
    let mut kill_on_exit = true;
    let mut tenant = Tenant::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--prod" => prod = true,
            "--keep-alive" => kill_on_exit = false,
            "--tenant" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--tenant requires a value\n{}", USAGE))?;
                tenant = value.parse()?;
            }
            other if path.is_none() => path = Some(other.to_string()),
            other => anyhow::bail!("unexpected argument '{}'\n{}", other, USAGE),
        }
    }
    let path = path.ok_or_else(|| anyhow::anyhow!(USAGE))?;

    let raw = tokio::fs::read_to_string(&path).await?;
    let rating_request: RatingRequest = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("invalid rating request in {}: {}", path, e))?;

    let config = Config::from_env()?;
    let engine = get_underwriting_engine(&config, prod, kill_on_exit).await?;

    let outcome = engine.underwrite_policy(&rating_request, tenant).await;
    engine.release().await?;

    match outcome? {
        Some(log_line) => {
            println!("{}", log_line.to_json_line()?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            tracing::error!("Underwriting produced no result for {}", path);
            Ok(ExitCode::from(2))
        }
    }
}
