//! Doctor command - check that the trust store is reachable

use anyhow::{bail, Result};
use seckit_lib::{SecError, StoreConfig};

use super::CliKeychain;
use crate::ui;

const CHECK_SERVICE: &str = "dev.seckit.doctor";

fn check(name: &str, outcome: Result<usize, SecError>) -> bool {
    match outcome {
        Ok(count) => {
            ui::success(&format!("{}: reachable ({} item(s))", name, count));
            true
        }
        Err(err) => {
            ui::error(&format!("{}: {}", name, err));
            if err.remediation().is_none() {
                if let Some(code) = err.code() {
                    ui::key_value("Status", &code.to_string());
                }
            }
            false
        }
    }
}

pub fn run(keychain: &CliKeychain, config: &StoreConfig) -> Result<()> {
    ui::header("Keychain");
    ui::key_value("Runtime", keychain.store().runtime().name());
    ui::key_value(
        "Data protection keychain",
        if config.data_protection_keychain { "yes" } else { "no" },
    );
    ui::key_value(
        "Access group",
        config.access_group.as_deref().unwrap_or("(default)"),
    );

    ui::header("Checks");
    let secrets = check(
        "Generic passwords",
        keychain.secrets().list(CHECK_SERVICE).map(|found| found.len()),
    );
    let keys = check(
        "Secure Enclave keys",
        keychain.keys().list(CHECK_SERVICE, "").map(|found| found.len()),
    );

    if secrets && keys {
        ui::success("All checks passed");
        Ok(())
    } else {
        bail!("Keychain checks failed")
    }
}
