use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use reqwest_eventsource::{Event, EventSource};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use toolbridge_core::Error;
use toolbridge_mcp::{JsonRpcRequest, JsonRpcResponse};

use super::{transport_error, RpcChannel};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests waiting for their response on the stream. Once the reader has
/// stopped the table is closed and refuses new waiters, so a request can
/// never register after the last chance of being answered.
#[derive(Debug, Default)]
struct Waiters {
    senders: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
struct Pending(Arc<Mutex<Waiters>>);

impl Pending {
    fn lock(&self) -> MutexGuard<'_, Waiters> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, id: u64) -> Result<oneshot::Receiver<JsonRpcResponse>, Error> {
        let mut waiters = self.lock();
        if waiters.closed {
            return Err(Error::Transport("SSE connection closed".to_string()));
        }
        let (tx, rx) = oneshot::channel();
        waiters.senders.insert(id, tx);
        Ok(rx)
    }

    fn complete(&self, id: u64, response: JsonRpcResponse) {
        let waiter = self.lock().senders.remove(&id);
        match waiter {
            // The caller may have given up (timeout or cancelled turn).
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => tracing::debug!(id, "no waiter for response"),
        }
    }

    fn forget(&self, id: u64) {
        self.lock().senders.remove(&id);
    }

    /// Release every waiter with a closed channel and refuse new ones.
    fn close(&self) {
        let mut waiters = self.lock();
        waiters.closed = true;
        waiters.senders.clear();
    }
}

/// SSE channel: `GET {base}/sse` announces a per-session POST endpoint;
/// requests are POSTed there and their responses come back on the stream,
/// matched to waiting callers by JSON-RPC id.
#[derive(Debug)]
pub struct SseChannel {
    client: Client,
    endpoint: Url,
    pending: Pending,
    reader: JoinHandle<()>,
    timeout: Duration,
}

impl SseChannel {
    /// Open the event stream and wait for the server to announce the
    /// session's POST endpoint.
    pub async fn open(base_url: &str) -> Result<Self, Error> {
        let sse_url = Url::parse(base_url)
            .and_then(|base| base.join("/sse"))
            .map_err(|e| Error::Transport(format!("invalid server URL '{base_url}': {e}")))?;

        let client = Client::new();
        let mut stream = EventSource::new(client.get(sse_url.clone()))
            .map_err(|e| Error::Transport(format!("cannot open SSE stream: {e}")))?;
        tracing::info!("Connecting to SSE: {sse_url}");

        let endpoint = match tokio::time::timeout(
            CONNECT_TIMEOUT,
            wait_for_endpoint(&mut stream, &sse_url),
        )
        .await
        {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(err)) => {
                stream.close();
                return Err(err);
            }
            Err(_) => {
                stream.close();
                return Err(Error::Transport(format!(
                    "no endpoint announced by {sse_url} within {CONNECT_TIMEOUT:?}"
                )));
            }
        };
        tracing::debug!("SSE session endpoint: {endpoint}");

        let pending = Pending::default();
        let reader = tokio::spawn(read_responses(stream, pending.clone()));

        Ok(Self {
            client,
            endpoint,
            pending,
            reader,
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Override how long a request waits for its response.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post(&self, request: &JsonRpcRequest) -> Result<(), Error> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }
}

impl Drop for SseChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl RpcChannel for SseChannel {
    async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, Error> {
        let id = request
            .id
            .as_u64()
            .ok_or_else(|| Error::Protocol("SSE requests need a numeric id".to_string()))?;
        let rx = self.pending.register(id)?;

        if let Err(err) = self.post(request).await {
            self.pending.forget(id);
            return Err(err);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::Transport(
                "SSE connection closed before the response arrived".to_string(),
            )),
            Err(_) => {
                self.pending.forget(id);
                Err(Error::Transport(format!(
                    "no response to request {id} within {:?}",
                    self.timeout
                )))
            }
        }
    }

    async fn notify(&self, request: &JsonRpcRequest) -> Result<(), Error> {
        self.post(request).await
    }
}

async fn wait_for_endpoint(stream: &mut EventSource, base: &Url) -> Result<Url, Error> {
    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Open) => tracing::debug!("SSE connection established"),
            Ok(Event::Message(msg)) if msg.event == "endpoint" => {
                return base
                    .join(msg.data.trim())
                    .map_err(|e| Error::Protocol(format!("bad endpoint '{}': {e}", msg.data)));
            }
            Ok(Event::Message(msg)) => {
                tracing::debug!(event = %msg.event, "ignoring SSE event before endpoint");
            }
            Err(e) => return Err(Error::Transport(format!("SSE connection failed: {e}"))),
        }
    }
    Err(Error::Transport(
        "SSE stream ended before an endpoint was announced".to_string(),
    ))
}

/// Route responses from the stream to their waiting requests. When the
/// stream ends every waiter is released with a closed channel.
async fn read_responses(mut stream: EventSource, pending: Pending) {
    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Message(msg)) if msg.event == "message" => {
                let response: JsonRpcResponse = match serde_json::from_str(&msg.data) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Failed to parse SSE message: {e}");
                        continue;
                    }
                };
                let Some(id) = response.id.as_u64() else {
                    tracing::warn!(id = %response.id, "response without a numeric id");
                    continue;
                };
                pending.complete(id, response);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("SSE error: {e}");
                break;
            }
        }
    }

    stream.close();
    pending.close();
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn response_reaches_its_waiter() {
        let pending = Pending::default();
        let rx = pending.register(4).unwrap();

        pending.complete(4, JsonRpcResponse::success(json!(4), json!({"ok": true})));
        let response = rx.await.unwrap();
        assert_eq!(response.result, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn closing_releases_waiters() {
        let pending = Pending::default();
        let rx = pending.register(1).unwrap();

        pending.close();
        assert!(rx.await.is_err());
    }

    #[test]
    fn no_waiters_after_close() {
        let pending = Pending::default();
        pending.close();

        let err = pending.register(2).unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "{err:?}");
        assert!(pending.lock().senders.is_empty());
    }

    #[test]
    fn forgotten_waiter_ignores_late_response() {
        let pending = Pending::default();
        let _rx = pending.register(3).unwrap();
        pending.forget(3);

        pending.complete(3, JsonRpcResponse::success(json!(3), json!({})));
        assert!(pending.lock().senders.is_empty());
    }
}
