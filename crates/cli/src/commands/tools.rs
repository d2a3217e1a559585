//! `stepwise tools`: list the tool catalog the agent is offered.

use stepwise_core::tool::ToolRegistry;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let registry = stepwise_agent::build_registry(&config);

    println!("Built-in tools");
    println!("==============");
    print!("{}", render(&registry));
    println!();
    println!("  Special tools (end the run): {}", config.agent.special_tools.join(", "));
    if config.tools.allowed_commands.is_empty() {
        println!("  Shell allowlist: (any command)");
    } else {
        println!("  Shell allowlist: {}", config.tools.allowed_commands.join(" "));
    }

    Ok(())
}

fn render(registry: &ToolRegistry) -> String {
    registry
        .definitions()
        .iter()
        .map(|def| {
            let required = def.parameters["required"]
                .as_array()
                .map(|r| {
                    r.iter()
                        .filter_map(|v| v.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            format!("  {:<18} ({required})\n      {}\n", def.name, def.description)
        })
        .collect()
}
