use anyhow::Context;

use echoapi_api::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    echoapi_observability::init_with(
        config.as_ref().map(|c| c.log_format).unwrap_or_default(),
    );
    let config = config.context("invalid server configuration")?;

    echoapi_api::server::run(config).await
}
