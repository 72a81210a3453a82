//! Key commands - Secure Enclave signing keys

use anyhow::{bail, Context, Result};
use seckit_lib::{AuthContext, EnclaveKey, NewKey};
use sha2::{Digest, Sha256};

use super::CliKeychain;
use crate::ui;

pub struct SignInput<'a> {
    pub tag: &'a str,
    pub label: &'a str,
    pub digest: Option<&'a str>,
    pub message: Option<&'a str>,
    pub reason: &'a str,
}

fn show(key: &EnclaveKey) {
    ui::key_value("Tag", &key.tag);
    if !key.label.is_empty() {
        ui::key_value("Label", &key.label);
    }
    ui::key_value("Application label", &hex::encode(&key.application_label));
    ui::key_value("Public key", &hex::encode(key.public_point()));
}

pub fn create(keychain: &CliKeychain, tag: &str, label: &str, user_presence: bool) -> Result<()> {
    let input = NewKey::new(tag)
        .label(label)
        .require_user_presence(user_presence);
    let key = keychain.keys().create(&input)?;

    ui::success("Created key in the Secure Enclave");
    show(&key);
    if user_presence {
        ui::info("Signing with this key will ask for Touch ID or your password");
    }
    Ok(())
}

pub fn get(keychain: &CliKeychain, tag: &str, label: &str) -> Result<()> {
    let key = keychain.keys().get(tag, label)?;
    ui::header("Key");
    show(&key);
    Ok(())
}

pub fn list(keychain: &CliKeychain, tag: &str, label: &str) -> Result<()> {
    let keys = keychain.keys().list(tag, label)?;
    if keys.is_empty() {
        ui::info(&format!("No keys under {}", tag));
        return Ok(());
    }

    ui::header(&format!("Keys under {} ({})", tag, keys.len()));
    for (index, key) in keys.iter().enumerate() {
        if index > 0 {
            ui::separator();
        }
        show(key);
    }
    Ok(())
}

pub fn delete(keychain: &CliKeychain, tag: &str, label: &str, yes: bool) -> Result<()> {
    if !yes && !ui::confirm(&format!("Delete every key under {}?", tag), false)? {
        ui::info("Cancelled");
        return Ok(());
    }

    match keychain.keys().delete(tag, label) {
        Ok(removed) => {
            ui::success(&format!("Deleted {} key(s)", removed));
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            ui::info("Nothing to delete");
            Ok(())
        }
        Err(err) => {
            if err.removed > 0 {
                ui::warning(&format!("Deleted {} key(s) before failing", err.removed));
            }
            Err(err.into())
        }
    }
}

/// The digest to sign: `--digest` as hex, or SHA-256 of `--message`.
pub fn digest_of(digest: Option<&str>, message: Option<&str>) -> Result<Vec<u8>> {
    match (digest, message) {
        (Some(hex_digest), None) => {
            hex::decode(hex_digest.trim()).context("Digest must be hex encoded")
        }
        (None, Some(message)) => Ok(Sha256::digest(message.as_bytes()).to_vec()),
        _ => bail!("Pass exactly one of --digest or --message"),
    }
}

pub fn sign(keychain: &CliKeychain, input: SignInput<'_>) -> Result<()> {
    let digest = digest_of(input.digest, input.message)?;
    let key = keychain
        .keys()
        .get(input.tag, input.label)?
        .with_auth_context(AuthContext::new(input.reason));

    let spinner = ui::spinner("Signing...");
    let result = keychain.keys().sign(&key, &digest);
    spinner.finish_and_clear();
    let signature = result?;

    tracing::debug!(signature_len = signature.len(), "signature created");
    if !key.verify(&digest, &signature) {
        bail!("Signature did not verify against the key's public point");
    }
    println!("{}", hex::encode(signature));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_from_hex() {
        assert_eq!(digest_of(Some("00ff"), None).unwrap(), vec![0x00, 0xff]);
        assert!(digest_of(Some("zz"), None).is_err());
    }

    #[test]
    fn test_digest_from_message() {
        let digest = digest_of(None, Some("hello")).unwrap();
        assert_eq!(
            hex::encode(digest),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_digest_needs_one_source() {
        assert!(digest_of(None, None).is_err());
        assert!(digest_of(Some("00"), Some("x")).is_err());
    }
}
