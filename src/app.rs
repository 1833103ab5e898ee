/**
Entry point wiring for `cmwatch`

Loads the kubeconfig, prints the `ConfigMap` once, then watches it in the
background until the run duration elapses, Ctrl-C arrives, or the watch gives up.
*/
use crate::cli::Args;
use crate::error::{Error, Result};
use crate::k8s::client::{self, kubeconfig_path};
use crate::k8s::configmaps::{
    data_value, dynamic_value, get_configmap, get_configmap_dynamic, render,
};
use crate::k8s::user_agent;
use crate::watch::{
    ApiWatchSource, ConfigMapWatcher, EventPrinter, WatchConfig, WatchOutcome, WatchSource,
};
use kube::Client;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run the whole program
///
/// # Errors
///
/// Returns the first unrecoverable error: kubeconfig, client, initial fetch,
/// or a watch that ran out of retries
pub async fn run(args: Args) -> Result<()> {
    let path = kubeconfig_path(args.kubeconfig.clone())?;
    let client = client::new(
        &mut std::io::stdout(),
        &path,
        args.context.clone(),
        &user_agent(),
    )
    .await?;

    fetch_and_watch(client, args.watch_config(), args.dynamic, args.run_duration()).await
}

/// Print the `ConfigMap` once, then watch it until `run_for` elapses
///
/// Nothing is watched when the first fetch fails.
///
/// # Errors
///
/// Returns the fetch error, or the error that ended the watch
pub async fn fetch_and_watch(
    client: Client,
    config: WatchConfig,
    dynamic: bool,
    run_for: Duration,
) -> Result<()> {
    show_configmap(&mut std::io::stdout(), client.clone(), &config, dynamic).await?;

    let cancel = CancellationToken::new();
    let printer = Arc::new(EventPrinter::stdout(config.key.clone()));
    let source = ApiWatchSource::new(client, &config);
    let handle = spawn_watch(source, config, printer, cancel.clone());

    supervise(handle, run_for, &cancel).await
}

/// Fetch the `ConfigMap` once and write it to `out`
///
/// # Errors
///
/// Will return `Err` if the object cannot be fetched, rendered or written
pub async fn show_configmap<W: Write>(
    out: &mut W,
    client: Client,
    config: &WatchConfig,
    dynamic: bool,
) -> Result<()> {
    let rendered = if dynamic {
        let obj = get_configmap_dynamic(client, &config.namespace, &config.name).await?;
        log_current_value(dynamic_value(&obj, &config.key), &config.key);
        render(&obj)?
    } else {
        let cm = get_configmap(client, &config.namespace, &config.name).await?;
        log_current_value(data_value(&cm, &config.key), &config.key);
        render(&cm)?
    };
    writeln!(out, "{rendered}").map_err(Error::Console)?;
    Ok(())
}

fn log_current_value(value: Option<&str>, key: &str) {
    match value {
        Some(value) => info!("📄 Current {} is {}", key, value),
        None => warn!("ConfigMap has no {:?} key yet", key),
    }
}

/// Start the watch loop on a background task
pub fn spawn_watch<S, W>(
    source: S,
    config: WatchConfig,
    printer: Arc<EventPrinter<W>>,
    cancel: CancellationToken,
) -> JoinHandle<Result<WatchOutcome>>
where
    S: WatchSource + 'static,
    W: Write + Send + 'static,
{
    tokio::spawn(async move {
        let mut watcher = ConfigMapWatcher::new(source, config);
        let outcome = watcher.run(&*printer, &cancel).await;
        debug!("watch finished with {:?}", watcher.stats());
        outcome
    })
}

/// Wait for the watch task, stopping it after `run_for` or on Ctrl-C
///
/// # Errors
///
/// Returns the watch task's error, or an error if the task panicked
pub async fn supervise(
    mut handle: JoinHandle<Result<WatchOutcome>>,
    run_for: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let finished = tokio::select! {
        joined = &mut handle => Some(joined),
        () = sleep(run_for) => {
            info!("⏱️ Run duration of {:?} elapsed", run_for);
            None
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping watch");
            None
        }
    };

    let joined = match finished {
        Some(joined) => joined,
        None => {
            cancel.cancel();
            handle.await
        }
    };

    match joined {
        Ok(Ok(outcome)) => {
            debug!("watch task ended: {:?}", outcome);
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(join_error) => Err(Error::Custom(format!("watch task failed: {join_error}"))),
    }
}
