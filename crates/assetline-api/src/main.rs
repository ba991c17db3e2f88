use assetline_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (databases, services, routes)
    let app = assetline_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    assetline_api::setup::server::start_server(&config, app).await?;

    Ok(())
}
