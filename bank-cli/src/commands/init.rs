//! Init command - settings and token key

use anyhow::{anyhow, Result};
use bank_core::config::{generate_symmetric_key, Config};
use bank_core::TokenScheme;
use colored::Colorize;

use super::get_bank_dir;
use crate::output;

pub fn run(scheme: Option<String>, force: bool, json: bool) -> Result<()> {
    let bank_dir = get_bank_dir()?;
    std::fs::create_dir_all(&bank_dir)?;
    let mut config = Config::load(&bank_dir)?;

    if let Some(scheme) = scheme {
        config.token_scheme = scheme.parse::<TokenScheme>().map_err(|e| anyhow!(e))?;
    }

    let had_key = config.symmetric_key().is_ok();
    let new_key = !had_key || force;
    if new_key {
        config.token_symmetric_key = Some(generate_symmetric_key());
    }

    config.validate()?;
    config.save(&bank_dir)?;

    if json {
        return output::json(&serde_json::json!({
            "bank_dir": bank_dir.to_string_lossy(),
            "token_scheme": config.token_scheme.as_str(),
            "key_generated": new_key,
        }));
    }

    output::success(&format!("Initialized {}", bank_dir.display()));
    println!("  Token scheme: {}", config.token_scheme.as_str().bold());
    if new_key && had_key {
        output::warning("  New token key generated; previously issued credentials are now invalid");
    } else if new_key {
        println!("  Token key generated");
    } else {
        println!("  Existing token key kept (use --force to replace it)");
    }
    Ok(())
}
