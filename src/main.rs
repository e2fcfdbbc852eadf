//! consul-loader CLI
//!
//! Moves configuration between Consul KV prefixes and JSON files. Exactly
//! one source (`--srcKey` or `--srcJSON`) and one destination (`--destKey`
//! or `--destJSON`) must be given. The Consul agent is configured through
//! the usual `CONSUL_HTTP_*` environment variables.

use clap::Parser;
use consul_loader::{KvStore, Migration, MigrationOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "consul-loader")]
#[command(about = "Move configuration between Consul KV prefixes and JSON files")]
#[command(version)]
struct Cli {
    /// Key to move values from
    #[arg(long = "srcKey", value_name = "PREFIX")]
    src_key: Option<String>,

    /// File to import values from
    #[arg(long = "srcJSON", value_name = "PATH")]
    src_json: Option<PathBuf>,

    /// Key to move values to
    #[arg(long = "destKey", value_name = "PREFIX")]
    dest_key: Option<String>,

    /// File to export values to
    #[arg(long = "destJSON", value_name = "PATH")]
    dest_json: Option<PathBuf>,

    /// Write top-level subtrees directly under the destination key
    /// (top-level values land at <destKey>/<name>)
    #[arg(long)]
    rename: bool,

    /// Consul agent address, overrides CONSUL_HTTP_ADDR
    #[arg(long, value_name = "ADDR")]
    http_addr: Option<String>,

    /// ACL token, overrides CONSUL_HTTP_TOKEN
    #[arg(long)]
    token: Option<String>,

    /// Datacenter to query instead of the agent's own
    #[arg(long)]
    datacenter: Option<String>,
}

impl Cli {
    fn options(&self) -> MigrationOptions {
        MigrationOptions {
            src_key: self.src_key.clone(),
            src_json: self.src_json.clone(),
            dest_key: self.dest_key.clone(),
            dest_json: self.dest_json.clone(),
            rename: self.rename,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("consul_loader=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let migration = Migration::from_options(&cli.options())?;

    // Only touch Consul when one side actually lives there
    let store = if migration.needs_backend() {
        Some(connect(&cli)?)
    } else {
        None
    };

    migration.run(store.as_deref())?;
    Ok(())
}

#[cfg(feature = "consul")]
fn connect(cli: &Cli) -> anyhow::Result<Box<dyn KvStore>> {
    use consul_loader::{ConsulClient, ConsulConfig};

    let mut config = ConsulConfig::from_env()?;
    if let Some(addr) = &cli.http_addr {
        config.set_address(addr);
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    if let Some(dc) = &cli.datacenter {
        config.datacenter = Some(dc.clone());
    }

    let client = ConsulClient::new(config)?;
    tracing::debug!(address = %client.config().base_url(), "using Consul agent");
    Ok(Box::new(client))
}

#[cfg(not(feature = "consul"))]
fn connect(_cli: &Cli) -> anyhow::Result<Box<dyn KvStore>> {
    Err(consul_loader::Error::BackendConnection(
        "built without the `consul` feature".into(),
    )
    .into())
}
