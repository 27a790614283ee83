use scanvault_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (_state, router, background) = scanvault_api::setup::initialize_app(config.clone()).await?;

    let served = scanvault_api::setup::server::start_server(&config, router).await;

    background.shutdown().await;
    served
}
