//! `stepwise run`: single-shot or interactive runs.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    message: Option<String>,
    system_prompt: Option<String>,
    max_steps: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;
    if let Some(steps) = max_steps {
        config.agent.max_steps = steps;
        config.validate()?;
    }
    super::require_api_key(&config)?;

    let provider = stepwise_providers::build_from_config(&config).default_provider()?;
    let tools = Arc::new(stepwise_agent::build_registry(&config));
    let tool_names = tools.names().join(", ");
    let agent = stepwise_agent::build_agent(&config, provider, tools);
    tracing::debug!(tools = %tool_names, max_steps = config.agent.max_steps, "Agent ready");

    if let Some(msg) = message {
        eprint!("  Working...");
        let result = agent.run(&msg, system_prompt.as_deref()).await;
        eprint!("\r             \r");
        println!("{result}");
        return Ok(());
    }

    println!();
    println!("  Stepwise: Interactive Mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {tool_names}");
    println!("  Max steps: {}", config.agent.max_steps);
    println!();
    println!("  Type a request and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }

        eprint!("  ...");
        let result = agent.run(query, system_prompt.as_deref()).await;
        eprint!("\r     \r");
        println!();
        for line in result.lines() {
            println!("  Agent > {line}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
