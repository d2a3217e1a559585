//! `stepwise serve`: start the HTTP front end.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    super::require_api_key(&config)?;

    println!("Stepwise gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.default_model);

    stepwise_gateway::start(config).await?;
    Ok(())
}
