//! Credential environment check

use anyhow::Result;
use kiln_gen::config::{env_help, missing_env_vars};

pub fn run(include_storage: bool) -> Result<()> {
    let missing = missing_env_vars(include_storage);

    if missing.is_empty() {
        println!("All required environment variables are set.");
        if !include_storage {
            println!("  (run with --storage to also check image upload settings)");
        }
        return Ok(());
    }

    println!("Missing environment variables:");
    for var in &missing {
        println!("  {}", var);
    }
    println!();
    println!("{}", env_help());
    Ok(())
}
