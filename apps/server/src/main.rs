use pricefeed_server::config::Config;
use pricefeed_server::server::serve;
use pricefeed_server::{build_state, init_tracing};
use tokio::io::{stdin, stdout, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_format);
    let service = build_state(&config)?;

    tracing::info!("Starting stock prices server, waiting for requests on stdin");
    serve(&service, BufReader::new(stdin()), stdout()).await?;
    Ok(())
}
