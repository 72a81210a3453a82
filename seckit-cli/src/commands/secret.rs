//! Secret commands - generic password items

use std::io::Write;

use anyhow::Result;
use zeroize::Zeroizing;

use super::CliKeychain;
use crate::ui;

/// Read the secret from `--data` or prompt for it.
fn secret_bytes(data: Option<String>) -> Result<Zeroizing<Vec<u8>>> {
    let text = match data {
        Some(text) => Zeroizing::new(text),
        None => ui::secret_input("Secret: ")?,
    };
    Ok(Zeroizing::new(text.as_bytes().to_vec()))
}

pub fn add(keychain: &CliKeychain, account: &str, service: &str, data: Option<String>) -> Result<()> {
    let data = secret_bytes(data)?;
    keychain.secrets().add(account, service, &data)?;
    ui::success(&format!("Stored secret for {} in {}", account, service));
    Ok(())
}

pub fn update(
    keychain: &CliKeychain,
    account: &str,
    service: &str,
    data: Option<String>,
) -> Result<()> {
    let data = secret_bytes(data)?;
    keychain.secrets().update(account, service, &data)?;
    ui::success(&format!("Updated secret for {} in {}", account, service));
    Ok(())
}

pub fn get(keychain: &CliKeychain, account: &str, service: &str, raw: bool) -> Result<()> {
    let secret = keychain.secrets().get(account, service)?;
    if raw {
        let mut stdout = std::io::stdout();
        stdout.write_all(&secret.data)?;
        stdout.flush()?;
        return Ok(());
    }

    ui::header("Secret");
    ui::key_value("Account", &secret.account);
    ui::key_value("Service", &secret.service);
    match secret.data_str() {
        Some(text) => ui::key_value("Data", text),
        None => ui::key_value("Data (hex)", &hex::encode(&*secret.data)),
    }
    Ok(())
}

pub fn list(keychain: &CliKeychain, service: &str) -> Result<()> {
    let secrets = keychain.secrets().list(service)?;
    if secrets.is_empty() {
        ui::info(&format!("No secrets stored for {}", service));
        return Ok(());
    }

    ui::header(&format!("Secrets for {} ({})", service, secrets.len()));
    for secret in &secrets {
        ui::key_value(&secret.account, &format!("{} bytes", secret.data.len()));
    }
    Ok(())
}

pub fn delete(keychain: &CliKeychain, account: Option<&str>, service: &str, yes: bool) -> Result<()> {
    let target = match account {
        Some(account) => format!("the secret for {} in {}", account, service),
        None => format!("every secret in {}", service),
    };
    if !yes && !ui::confirm(&format!("Delete {}?", target), false)? {
        ui::info("Cancelled");
        return Ok(());
    }

    match keychain.secrets().delete(account, service) {
        Ok(removed) => {
            ui::success(&format!("Deleted {} secret(s)", removed));
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            ui::info("Nothing to delete");
            Ok(())
        }
        Err(err) => {
            if err.removed > 0 {
                ui::warning(&format!("Deleted {} secret(s) before failing", err.removed));
            }
            Err(err.into())
        }
    }
}
