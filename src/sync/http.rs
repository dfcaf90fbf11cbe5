//! REST-backed remote store
//!
//! `GET {endpoint}/records`, `POST {endpoint}/records` and
//! `PATCH {endpoint}/records/{id}` with JSON bodies. Realtime is emulated by
//! polling the collection and forwarding records whose timestamp or data
//! changed.

use super::remote::{RecordBody, RemoteRecord, RemoteStore};
use crate::error::SyncError;
use crate::types::{Millis, RemoteId};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const POLL_CAPACITY: usize = 256;

pub struct HttpRemoteStore {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    poll_interval: Duration,
    poller: Mutex<Option<broadcast::Sender<RemoteRecord>>>,
}

impl HttpRemoteStore {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("grove/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Request(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            poll_interval,
            poller: Mutex::new(None),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/records", self.endpoint)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn fetch_all(client: &Client, url: &str, api_key: Option<&str>) -> Result<Vec<RemoteRecord>, SyncError> {
        let mut request = client.get(url);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?.error_for_status()?;
        decode(response).await
    }

    /// Poll the collection, forwarding changed records until nobody listens
    async fn poll_loop(
        client: Client,
        url: String,
        api_key: Option<String>,
        interval: Duration,
        sender: broadcast::Sender<RemoteRecord>,
    ) {
        let mut seen: HashMap<RemoteId, (Millis, serde_json::Value)> = HashMap::new();
        let mut primed = false;
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            if sender.receiver_count() == 0 {
                break;
            }
            let records = match Self::fetch_all(&client, &url, api_key.as_deref()).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "Remote poll failed");
                    continue;
                }
            };
            for record in records {
                // The first listing only establishes the baseline
                if remember_changed(&mut seen, &record) && primed {
                    let _ = sender.send(record);
                }
            }
            primed = true;
        }
        debug!(url = %url, "Remote poller stopped");
    }
}

/// Record `record` in `seen`, returning whether its stamp or data differ
/// from the last listing
fn remember_changed(seen: &mut HashMap<RemoteId, (Millis, serde_json::Value)>, record: &RemoteRecord) -> bool {
    let changed = seen
        .get(&record.remote_id)
        .map_or(true, |(ts, data)| *ts != record.last_modified || *data != record.data);
    if changed {
        seen.insert(
            record.remote_id.clone(),
            (record.last_modified, record.data.clone()),
        );
    }
    changed
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, SyncError> {
    response
        .json::<T>()
        .await
        .map_err(|e| SyncError::Malformed(e.to_string()))
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn list_all(&self) -> Result<Vec<RemoteRecord>, SyncError> {
        Self::fetch_all(&self.client, &self.collection_url(), self.api_key.as_deref()).await
    }

    async fn create(&self, body: RecordBody) -> Result<RemoteRecord, SyncError> {
        let response = self
            .authorize(self.client.post(self.collection_url()))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        decode(response).await
    }

    async fn update(&self, remote_id: &str, body: RecordBody) -> Result<RemoteRecord, SyncError> {
        let url = format!("{}/{}", self.collection_url(), remote_id);
        let response = self.authorize(self.client.patch(url)).json(&body).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SyncError::RecordNotFound(remote_id.to_string()));
        }
        decode(response.error_for_status()?).await
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<RemoteRecord>, SyncError> {
        let mut poller = self.poller.lock();
        if let Some(sender) = poller.as_ref() {
            if sender.receiver_count() > 0 {
                return Ok(sender.subscribe());
            }
        }

        let handle = Handle::try_current().map_err(|_| SyncError::RealtimeUnsupported)?;
        let (sender, receiver) = broadcast::channel(POLL_CAPACITY);
        handle.spawn(Self::poll_loop(
            self.client.clone(),
            self.collection_url(),
            self.api_key.clone(),
            self.poll_interval,
            sender.clone(),
        ));
        *poller = Some(sender);
        Ok(receiver)
    }
}
