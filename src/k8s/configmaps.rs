use crate::error::Result;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::serde::Serialize;
use k8s_openapi::serde_json;
use kube::api::{Api, ApiResource, DynamicObject};
use kube::Client;
use tracing::{debug, error, warn};

/// Read a single `ConfigMap` by name
///
/// # Errors
///
/// Will return `Err` if the object cannot be retrieved from the k8s cluster api
/// (missing, forbidden, unreachable)
pub async fn get_configmap(client: Client, namespace: &str, name: &str) -> Result<ConfigMap> {
    debug!("get_configmap: fetching {}/{}", namespace, name);
    let api: Api<ConfigMap> = Api::namespaced(client, namespace);
    let cm = api.get(name).await.map_err(|e| {
        let e = crate::error::Error::from(e);
        if e.is_auth_error() {
            error!("get_configmap: credentials rejected for {}/{}: {}", namespace, name, e);
        } else if e.is_not_found() {
            warn!("get_configmap: {}/{} does not exist", namespace, name);
        } else {
            error!("get_configmap: failed to fetch {}/{}: {}", namespace, name, e);
        }
        e
    })?;
    Ok(cm)
}

/// Read a single `ConfigMap` through the dynamic api, without the typed schema
///
/// # Errors
///
/// Will return `Err` if the object cannot be retrieved from the k8s cluster api
pub async fn get_configmap_dynamic(
    client: Client,
    namespace: &str,
    name: &str,
) -> Result<DynamicObject> {
    debug!("get_configmap_dynamic: fetching {}/{}", namespace, name);
    let resource = ApiResource::erase::<ConfigMap>(&());
    let api: Api<DynamicObject> = Api::namespaced_with(client, namespace, &resource);
    Ok(api.get(name).await?)
}

/// Look up `key` in the data of a typed `ConfigMap`
#[must_use]
pub fn data_value<'a>(cm: &'a ConfigMap, key: &str) -> Option<&'a str> {
    cm.data.as_ref()?.get(key).map(String::as_str)
}

/// Look up `key` in the `data` section of a dynamic `ConfigMap`
#[must_use]
pub fn dynamic_value<'a>(obj: &'a DynamicObject, key: &str) -> Option<&'a str> {
    obj.data.get("data")?.get(key)?.as_str()
}

/// Render a fetched object for the console
///
/// # Errors
///
/// Will return `Err` if the object cannot be serialized
pub fn render<T: Serialize>(obj: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(obj)?)
}
