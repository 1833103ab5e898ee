// Client creation from an explicit kubeconfig file
use crate::error::{Error, Result as CwResult};
use hyper::header::{HeaderName, HeaderValue};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Location of the kubeconfig relative to the user's home directory
pub const KUBECONFIG_RELATIVE_PATH: [&str; 2] = [".kube", "config"];

/// Resolve the kubeconfig path, falling back to `<home>/.kube/config`
///
/// # Errors
///
/// Returns `Error::HomeDirNotFound` if no override is given and the home
/// directory cannot be determined
pub fn kubeconfig_path(override_path: Option<PathBuf>) -> CwResult<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path);
    }
    let home = home::home_dir().ok_or(Error::HomeDirNotFound)?;
    Ok(kubeconfig_path_in(&home))
}

/// Join the fixed kubeconfig location onto a home directory
#[must_use]
pub fn kubeconfig_path_in(home: &Path) -> PathBuf {
    KUBECONFIG_RELATIVE_PATH
        .iter()
        .fold(home.to_path_buf(), |path, part| path.join(part))
}

/// Add the user-agent header to a kube `Config`, skipping values that are not
/// valid header text
pub fn add_user_agent_header(config: &mut Config, user_agent: &str) {
    match HeaderValue::from_str(user_agent) {
        Ok(header_value) => {
            config
                .headers
                .push((HeaderName::from_static("user-agent"), header_value));
        }
        Err(e) => {
            warn!("Ignoring invalid user agent {:?}: {}", user_agent, e);
        }
    }
}

/// Build a kube `Config` from a kubeconfig file
///
/// # Errors
///
/// Will return `Err` if the file cannot be read or does not describe a usable
/// cluster/context/user combination
pub async fn load_config(path: &Path, context: Option<String>) -> CwResult<Config> {
    debug!("📄 Reading kubeconfig from {}", path.display());
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
        error!("❌ Failed to read kubeconfig {}: {}", path.display(), e);
        e
    })?;

    let options = KubeConfigOptions {
        context,
        ..KubeConfigOptions::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| {
            error!("❌ Failed to build Kubernetes configuration: {}", e);
            e
        })?;
    Ok(config)
}

/// Create a new k8s client from the kubeconfig at `path`
///
/// The path is written to `out` before the file is read.
///
/// # Errors
///
/// Will return `Err` if the kubeconfig cannot be loaded or the client cannot be
/// constructed from it
pub async fn new<W: Write>(
    out: &mut W,
    path: &Path,
    context: Option<String>,
    user_agent: &str,
) -> CwResult<Client> {
    writeln!(out, "Using kubeconfig: {}", path.display()).map_err(Error::Console)?;

    let mut config = load_config(path, context).await?;
    add_user_agent_header(&mut config, user_agent);

    let client = Client::try_from(config).map_err(|e| {
        error!("❌ Failed to create Kubernetes client: {}", e);
        e
    })?;

    debug!("✅ Successfully created Kubernetes client");
    Ok(client)
}
