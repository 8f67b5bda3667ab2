use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use gd_browser::BrowserConfig;
use gd_storage::CertificateId;
use gd_storage::StorageConfig;
use std::path::PathBuf;

/// Manage the TLS client certificates presented to Gemini and HTTPS hosts
#[derive(Debug, Parser)]
#[command(name = "gemdust-certs", version)]
pub struct Opts {
    /// Log verbosity: -v info, -vv debug, -vvv trace (RUST_LOG otherwise)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Directory holding the certificate store (default: $GEMDUST_STORAGE_DIR or ./.gemdust)
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,
    /// Keep certificates in memory only; nothing is written to disk
    #[arg(long, global = true)]
    pub ephemeral: bool,
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

impl Opts {
    pub fn browser_config(&self) -> BrowserConfig {
        BrowserConfig {
            storage: StorageConfig {
                ephemeral_mode: self.ephemeral,
            },
            storage_root: self.storage_dir.clone(),
            ..BrowserConfig::default()
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// Lists certificates for one host, or for every host
    List(OptsList),
    /// Creates a named certificate for a host and activates it
    Create(OptsCreate),
    /// Creates an anonymous short-lived certificate for a host and activates it
    Transient(OptsHost),
    /// Makes a certificate the active one for its host
    Activate(OptsId),
    /// Stops presenting any certificate to a host
    Deactivate(OptsHost),
    /// Removes a certificate
    Delete(OptsId),
    /// Prints the details and fingerprint of a certificate
    Show(OptsId),
    /// Shows which certificate a connection to a URL would present
    Resolve(OptsResolve),
}

#[derive(Debug, Args)]
pub struct OptsList {
    /// Host to list certificates for
    pub host: Option<String>,
}

#[derive(Debug, Args)]
pub struct OptsCreate {
    pub host: String,
    /// Name shown when choosing between identities
    pub name: String,
    /// Validity period in days (default: 365)
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Debug, Args)]
pub struct OptsHost {
    pub host: String,
}

#[derive(Debug, Args)]
pub struct OptsId {
    /// Certificate id as printed by `list`
    pub id: CertificateId,
}

#[derive(Debug, Args)]
pub struct OptsResolve {
    /// gemini://, https:// or http:// URL
    pub url: String,
}
