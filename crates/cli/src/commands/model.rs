//! `courier model`: show how a model id routes.

use std::sync::Arc;

use courier_providers::ModelRouter;
use courier_security::{ModelAllowlist, ModelCheckResult};

use super::Loaded;

pub fn run(loaded: Loaded, id: &str) -> anyhow::Result<()> {
    let allowlist = ModelAllowlist::from_config(&loaded.config.allowlists, &loaded.config_dir);
    let router = ModelRouter::new(Arc::new(allowlist));

    let resolved = ModelRouter::resolve(id);
    println!("  Requested:   {}", id.trim());
    println!("  Resolved:    {resolved}");
    println!("  Token field: {}", ModelRouter::output_token_field(&resolved));

    let verdict = match router.check(&resolved) {
        ModelCheckResult::Allowed => "allowed".to_string(),
        ModelCheckResult::Unrestricted { provider } => {
            format!("allowed (no allowlist configured for '{provider}')")
        }
        ModelCheckResult::Denied { reason, .. } => format!("denied: {reason}"),
    };
    println!("  Allowlist:   {verdict}");
    Ok(())
}
