//! `depot components`: pluggable factories in the order they are tried

use anyhow::Result;
use depot_core::config::ConfigProperties;
use depot_core::connector::{ComponentProvider, Pluggable};

use super::Workspace;

fn print_ranked<F: ?Sized + Pluggable>(title: &str, provider: &ComponentProvider<F>, config: &ConfigProperties) {
    println!("{title}:");
    let ranked = provider.ranked(config);
    if ranked.is_empty() {
        println!("  (none registered)");
    }
    for candidate in ranked.all() {
        let suffix = if candidate.is_disabled() { " (disabled)" } else { "" };
        println!(
            "  {:<28} priority {}{suffix}",
            candidate.component_type().simple_name(),
            candidate.priority()
        );
    }
}

pub fn handle_components(workspace: &Workspace) -> Result<()> {
    let config = &workspace.config.properties;
    print_ranked("Repository connectors", &workspace.stack.connectors, config);
    println!();
    print_ranked("Repository layouts", &workspace.stack.layouts, config);
    println!();
    print_ranked("Transporters", &workspace.stack.transporters, config);
    Ok(())
}
