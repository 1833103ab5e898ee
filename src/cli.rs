use crate::watch::config::{
    DEFAULT_CONFIGMAP_NAME, DEFAULT_NAMESPACE, DEFAULT_RUN_SECONDS, DEFAULT_WATCH_KEY,
    MAX_WATCH_RESTARTS, WatchConfig,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Namespace of the `ConfigMap`
    #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Name of the `ConfigMap` to read and watch
    #[arg(long, default_value = DEFAULT_CONFIGMAP_NAME)]
    pub name: String,

    /// Data key printed whenever the `ConfigMap` changes
    #[arg(short, long, default_value = DEFAULT_WATCH_KEY)]
    pub key: String,

    /// Path to the kubeconfig, defaults to ~/.kube/config
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long)]
    pub context: Option<String>,

    /// Seconds to keep watching before exiting
    #[arg(long, default_value_t = DEFAULT_RUN_SECONDS)]
    pub run_for: u64,

    /// Consecutive failures tolerated before the watch gives up
    #[arg(long, default_value_t = MAX_WATCH_RESTARTS)]
    pub max_restarts: u32,

    /// Fetch the `ConfigMap` through the dynamic api
    #[arg(long)]
    pub dynamic: bool,

    /// Log level used when `RUST_LOG` is not set
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Args {
    #[must_use]
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig::new(&self.namespace, &self.name)
            .key(&self.key)
            .max_restarts(self.max_restarts)
    }

    #[must_use]
    pub const fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_for)
    }
}
