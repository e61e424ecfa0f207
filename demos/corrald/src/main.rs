//! Corral daemon.
//!
//! Loads the host configuration, initializes every plugin linked into the
//! binary (the CRI plugin among them) and runs until Ctrl+C or SIGTERM.
//!
//! The binary links no real content, image or task services, so it
//! registers in-memory placeholders for the services and the event exchange
//! the CRI plugin's runtime client needs.  Without them the CRI plugin fails
//! its init with a missing-service error.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package corrald -- --config /etc/corral/corral.toml
//! ENABLE_CRI_SANDBOXES=1 cargo run --package corrald
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use corral::prelude::*;
use corral::runtime::{EVENT_EXCHANGE, REQUIRED_SERVICES};

#[derive(Debug, Parser)]
#[command(name = "corrald", version, about = "Corral container runtime daemon")]
struct Args {
    /// Configuration file; `/etc/corral/corral.toml` and the user config
    /// directory are searched when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

fn placeholder(ic: InitContext) -> BoxFuture<'static, Result<Instance, BoxError>> {
    Box::pin(async move {
        debug!(plugin = %ic.id(), "Placeholder plugin initialized");
        Ok(Instance::new(std::sync::Arc::new(())))
    })
}

fn registry() -> Registry {
    let mut registry = Registry::from_static();
    for &id in REQUIRED_SERVICES {
        registry.register(Registration::new(PluginType::SERVICE, id, placeholder));
    }
    registry.register(Registration::new(PluginType::EVENT, EVENT_EXCHANGE, placeholder));
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = Host::builder().registry(registry());
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let host = builder.build()?;

    if args.check {
        info!(root = %host.config().root.display(), "Configuration is valid");
        return Ok(());
    }

    info!(
        cri_mode = %ServiceMode::from_env(),
        "Starting corrald"
    );
    host.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use corral::core::{ManagerSettings, PluginManager, PluginStatus};
    use corral::cri::PLUGIN_ID;

    use super::*;

    #[tokio::test]
    async fn test_cri_loads_with_placeholder_services() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ManagerSettings {
            root: dir.path().join("root"),
            state: dir.path().join("state"),
            address: "/run/corral/corral.sock".into(),
            ..Default::default()
        };

        let set = PluginManager::new(registry(), settings)
            .init_all()
            .await
            .unwrap();

        assert_eq!(set.status(PluginType::GRPC, PLUGIN_ID), Some(PluginStatus::Loaded));
        assert_eq!(
            set.status(PluginType::EVENT, EVENT_EXCHANGE),
            Some(PluginStatus::Loaded)
        );
        set.close_all().await;
    }
}
