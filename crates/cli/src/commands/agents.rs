//! `courier agents`: inspect the agent role catalog.

use std::sync::Arc;

use anyhow::anyhow;
use courier_agent::roles::{self, AgentRoleResolver};
use courier_agent::{DirectoryCatalog, StaticCatalog};
use courier_core::AgentCatalog;

use super::Loaded;

pub async fn run(loaded: Loaded, name: Option<&str>) -> anyhow::Result<()> {
    let config = &loaded.config;
    let catalog: Arc<dyn AgentCatalog> =
        match DirectoryCatalog::discover(config.agents.dir.as_deref(), &super::current_dir()) {
            Some(catalog) => {
                eprintln!("  Agents directory: {}", catalog.active_dir().display());
                Arc::new(catalog)
            }
            None => {
                eprintln!("  No agents directory found (set COURIER_AGENTS_DIR)");
                Arc::new(StaticCatalog::new())
            }
        };
    let resolver = AgentRoleResolver::new(catalog, config.agents.system_prompt_max_chars);

    let Some(name) = name else {
        let names = resolver.list().await.map_err(|e| anyhow!(e.user_message()))?;
        println!("{}", roles::list_message(&names));
        return Ok(());
    };

    match resolver.resolve(name).await.map_err(|e| anyhow!(e.user_message()))? {
        Some(spec) => {
            println!("# {}", spec.name);
            println!();
            println!("{}", spec.system_prompt);
            Ok(())
        }
        None => Err(anyhow!(roles::unknown_agent_message(name))),
    }
}
