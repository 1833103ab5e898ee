use super::config::WatchConfig;
use super::event::{ConfigMapEvent, decode_line};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::WatchParams;
use kube::client::Body;
use kube::{Client, Resource};
use std::io::ErrorKind;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

/// Stream of events from one watch subscription; ends when the server closes it
pub type EventStream = BoxStream<'static, Result<ConfigMapEvent>>;

/// Something that can open a watch subscription for a single `ConfigMap`
#[async_trait]
pub trait WatchSource: Send + Sync {
    /// Open a new subscription
    async fn subscribe(&self) -> Result<EventStream>;
}

/// Watches one named `ConfigMap` through the k8s cluster api
///
/// The response body is decoded line by line so that event types this program
/// does not know, and objects of the wrong kind, never end the subscription.
/// Only transport failures surface as stream errors.
pub struct ApiWatchSource {
    client: Client,
    url_path: String,
    params: WatchParams,
}

impl ApiWatchSource {
    #[must_use]
    pub fn new(client: Client, config: &WatchConfig) -> Self {
        let url_path = ConfigMap::url_path(&(), Some(config.namespace.as_str()));
        let params = WatchParams::default()
            .fields(&config.field_selector())
            .timeout(config.timeout_secs);
        Self {
            client,
            url_path,
            params,
        }
    }
}

#[async_trait]
impl WatchSource for ApiWatchSource {
    async fn subscribe(&self) -> Result<EventStream> {
        debug!("🔍 Opening watch with {:?}", self.params.field_selector);
        let request = kube::core::Request::new(self.url_path.as_str())
            .watch(&self.params, "0")
            .map_err(kube::Error::BuildRequest)?;
        let response = self.client.send(request.map(Body::from)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.into_body().collect().await?.to_bytes();
            return Err(Error::Custom(format!(
                "watch request rejected with {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }

        let body = response
            .into_body()
            .into_data_stream()
            .map_err(std::io::Error::other);
        let lines = FramedRead::new(StreamReader::new(body), LinesCodec::new());

        Ok(lines
            .filter_map(|line| async move {
                match line {
                    Ok(line) => decode_line(&line).map(Ok),
                    Err(LinesCodecError::Io(e))
                        if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::UnexpectedEof) =>
                    {
                        warn!("⚠️ Watch stream cut short: {}", e);
                        None
                    }
                    Err(LinesCodecError::Io(e)) => Some(Err(Error::Io(e))),
                    Err(e @ LinesCodecError::MaxLineLengthExceeded) => {
                        Some(Err(Error::Custom(e.to_string())))
                    }
                }
            })
            .boxed())
    }
}
