//! Provider listing

use anyhow::Result;
use kiln_gen::providers::{available_providers, sdk_install_instructions};
use kiln_gen::ProviderKind;

pub fn run() -> Result<()> {
    println!("Providers:");
    for (kind, available) in available_providers() {
        let default = if kind == ProviderKind::default() {
            " (default)"
        } else {
            ""
        };
        let status = if available { "available" } else { "not compiled in" };
        println!("  {:<6} {}{}", kind.as_str(), status, default);
    }

    if available_providers().iter().any(|(_, available)| !available) {
        println!();
        println!("{}", sdk_install_instructions());
    }
    Ok(())
}
