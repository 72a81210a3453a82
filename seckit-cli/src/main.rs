//! seckit CLI
//!
//! Command-line harness for keychain secrets and Secure Enclave signing keys.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use seckit_lib::{DeleteError, SecError};

mod commands;
mod config;
mod ui;

use config::{Backend, CliConfig};

#[derive(Parser)]
#[command(name = "seckit")]
#[command(about = "seckit - keychain secrets and Secure Enclave keys", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to <config dir>/seckit/config.json)
    #[arg(long, global = true, env = "SECKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Trust store to use
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage generic password secrets
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Manage Secure Enclave signing keys
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Check that the keychain is reachable with the current setup
    Doctor {
        /// Save the effective configuration to the config file
        #[arg(long)]
        write_config: bool,
    },
}

#[derive(Subcommand)]
enum SecretAction {
    /// Store a new secret
    Add {
        #[arg(short, long)]
        account: String,

        #[arg(short, long)]
        service: String,

        /// Secret value (prompted for when omitted)
        #[arg(long)]
        data: Option<String>,
    },

    /// Replace the value of an existing secret
    Update {
        #[arg(short, long)]
        account: String,

        #[arg(short, long)]
        service: String,

        /// New secret value (prompted for when omitted)
        #[arg(long)]
        data: Option<String>,
    },

    /// Show a secret
    Get {
        #[arg(short, long)]
        account: String,

        #[arg(short, long)]
        service: String,

        /// Write the raw bytes to stdout
        #[arg(long)]
        raw: bool,
    },

    /// List the secrets of a service
    List {
        #[arg(short, long)]
        service: String,
    },

    /// Delete one secret, or every secret of a service
    Delete {
        /// Account to delete; all accounts when omitted
        #[arg(short, long)]
        account: Option<String>,

        #[arg(short, long)]
        service: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Generate a new key in the Secure Enclave
    Create {
        /// Application tag for the key
        #[arg(short, long)]
        tag: String,

        #[arg(short, long, default_value = "")]
        label: String,

        /// Require Touch ID or the account password to sign
        #[arg(long)]
        user_presence: bool,
    },

    /// Show the first key under a tag
    Get {
        #[arg(short, long)]
        tag: String,

        #[arg(short, long, default_value = "")]
        label: String,
    },

    /// List every key under a tag
    List {
        #[arg(short, long)]
        tag: String,

        #[arg(short, long, default_value = "")]
        label: String,
    },

    /// Delete every key under a tag
    Delete {
        #[arg(short, long)]
        tag: String,

        #[arg(short, long, default_value = "")]
        label: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Sign a digest and print the DER signature as hex
    Sign {
        #[arg(short, long)]
        tag: String,

        #[arg(short, long, default_value = "")]
        label: String,

        /// Hex encoded digest to sign
        #[arg(long, conflicts_with = "message", required_unless_present = "message")]
        digest: Option<String>,

        /// Text to hash with SHA-256 and sign
        #[arg(long)]
        message: Option<String>,

        /// Prompt text for keys that need user presence
        #[arg(long)]
        reason: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("seckit_cli=debug,seckit_lib=debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("seckit_cli=info,seckit_lib=warn")
            .with_writer(std::io::stderr)
            .init();
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(sec) = err.downcast_ref::<SecError>() {
                commands::report(sec);
            } else if let Some(delete) = err.downcast_ref::<DeleteError>() {
                commands::report(&delete.source);
            } else {
                ui::error(&format!("{:#}", err));
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let writing = matches!(cli.command, Commands::Doctor { write_config: true });
    let config = match cli.config.as_deref() {
        // A config that is about to be written does not have to exist yet.
        Some(path) if writing && !path.exists() => CliConfig::default(),
        explicit => CliConfig::load(explicit)?,
    };
    let backend = cli.backend.or(config.backend).unwrap_or_default();
    tracing::debug!(?backend, "opening trust store");
    let keychain = commands::open_keychain(backend, config.store.clone());

    // Dispatch commands
    match cli.command {
        Commands::Secret { action } => match action {
            SecretAction::Add { account, service, data } => {
                commands::secret::add(&keychain, &account, &service, data)
            }
            SecretAction::Update { account, service, data } => {
                commands::secret::update(&keychain, &account, &service, data)
            }
            SecretAction::Get { account, service, raw } => {
                commands::secret::get(&keychain, &account, &service, raw)
            }
            SecretAction::List { service } => commands::secret::list(&keychain, &service),
            SecretAction::Delete { account, service, yes } => {
                commands::secret::delete(&keychain, account.as_deref(), &service, yes)
            }
        },
        Commands::Key { action } => match action {
            KeyAction::Create { tag, label, user_presence } => {
                commands::key::create(&keychain, &tag, &label, user_presence)
            }
            KeyAction::Get { tag, label } => commands::key::get(&keychain, &tag, &label),
            KeyAction::List { tag, label } => commands::key::list(&keychain, &tag, &label),
            KeyAction::Delete { tag, label, yes } => {
                commands::key::delete(&keychain, &tag, &label, yes)
            }
            KeyAction::Sign { tag, label, digest, message, reason } => {
                let input = commands::key::SignInput {
                    tag: &tag,
                    label: &label,
                    digest: digest.as_deref(),
                    message: message.as_deref(),
                    reason: reason.as_deref().unwrap_or(&config.sign_reason),
                };
                commands::key::sign(&keychain, input)
            }
        },
        Commands::Doctor { write_config } => {
            if write_config {
                let Some(path) = cli.config.clone().or_else(CliConfig::default_path) else {
                    bail!("No config directory on this platform; pass --config");
                };
                config.save_to(&path)?;
                ui::success(&format!("Wrote config to {}", path.display()));
            }
            commands::doctor::run(&keychain, &config.store)
        }
    }
}
