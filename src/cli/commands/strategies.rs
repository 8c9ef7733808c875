//! List strategies command.

use anyhow::Result;
use trading_strategies::{EnsembleSpec, StrategyRegistry};

pub fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {} ", info.name);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        println!("  defaults: {}", info.default_config);
        println!();
    }

    for (path, spec) in [
        ("buy", EnsembleSpec::buy_default()),
        ("sell", EnsembleSpec::sell_default()),
    ] {
        let members: Vec<String> = spec
            .strategies
            .iter()
            .map(|m| format!("{}×{}", m.name, m.weight))
            .collect();
        println!("Default {path} ensemble ({}): {}", spec.policy, members.join(", "));
    }

    Ok(())
}
