use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use toolbridge_core::Error;
use toolbridge_mcp::{JsonRpcRequest, JsonRpcResponse};

use super::{transport_error, RpcChannel};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Streamable HTTP channel: each request is a POST to `{base}/mcp` and the
/// response comes back in the body.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: Client,
    endpoint: Url,
}

impl HttpChannel {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join("/mcp"))
            .map_err(|e| Error::Transport(format!("invalid server URL '{base_url}': {e}")))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| transport_error(&e))?;
        Ok(Self { client, endpoint })
    }

    async fn post(&self, request: &JsonRpcRequest) -> Result<reqwest::Response, Error> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("HTTP {status}: {body}")));
        }
        Ok(resp)
    }
}

#[async_trait]
impl RpcChannel for HttpChannel {
    async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, Error> {
        self.post(request)
            .await?
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| Error::Protocol(format!("malformed JSON-RPC response: {e}")))
    }

    async fn notify(&self, request: &JsonRpcRequest) -> Result<(), Error> {
        self.post(request).await.map(drop)
    }
}
