//! Transmission RPC over HTTP.
//!
//! Requests are JSON documents `{"method": ..., "arguments": ...}` POSTed to the
//! RPC endpoint. The daemon protects against CSRF with a session id: a request
//! without the current id is answered with `409 Conflict` carrying the id in the
//! [`SESSION_ID_HEADER`] header, and the request is then retried once with it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, trace};

use super::error::{RpcError, RpcResult};
use super::types::{TorrentGetArguments, Transfer, TRANSFER_FIELDS};
use super::TransferClient;
use crate::config::DaemonConfig;

/// Header carrying the daemon's anti-CSRF session id.
pub const SESSION_ID_HEADER: &str = "x-transmission-session-id";

#[derive(Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Value>,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: String,
    #[serde(default)]
    arguments: T,
}

/// Blocking Transmission client.
///
/// HTTP calls run on a private current-thread runtime so the supervisor itself
/// stays synchronous.
pub struct TransmissionClient {
    runtime: Runtime,
    client: Client<HttpConnector, Full<Bytes>>,
    url: String,
    uri: Uri,
    authorization: Option<String>,
    timeout: Duration,
    session_id: RefCell<Option<String>>,
}

impl TransmissionClient {
    /// Create a client for the daemon described by `config`.
    pub fn new(config: &DaemonConfig) -> RpcResult<Self> {
        let url = config.rpc_url();
        let uri = url.parse::<Uri>().map_err(|e| RpcError::InvalidUrl {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(RpcError::Runtime)?;

        let authorization = config.username.as_ref().map(|user| {
            let password = config.password.as_deref().unwrap_or_default();
            format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
        });

        Ok(Self {
            runtime,
            client: Client::builder(TokioExecutor::new()).build_http(),
            url,
            uri,
            authorization,
            timeout: config.rpc_timeout(),
            session_id: RefCell::new(None),
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn call<T>(&self, method: &str, arguments: Option<Value>) -> RpcResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let body = Bytes::from(serde_json::to_vec(&RpcRequest { method, arguments })?);
        debug!("RPC {}", method);

        // One retry after learning the session id
        for _ in 0..2 {
            let exchange = self.runtime.block_on(async {
                tokio::time::timeout(self.timeout, self.exchange(body.clone()))
                    .await
                    .map_err(|_| RpcError::Timeout {
                        url: self.url.clone(),
                        seconds: self.timeout.as_secs(),
                    })?
            })?;

            match exchange {
                Exchange::SessionId(id) => {
                    trace!("Received new RPC session id");
                    *self.session_id.borrow_mut() = Some(id);
                }
                Exchange::Body(bytes) => {
                    let response: RpcResponse<T> = serde_json::from_slice(&bytes)?;
                    if response.result != "success" {
                        return Err(RpcError::Failed {
                            method: method.to_string(),
                            result: response.result,
                        });
                    }
                    return Ok(response.arguments);
                }
            }
        }

        Err(RpcError::SessionConflict)
    }

    async fn exchange(&self, body: Bytes) -> RpcResult<Exchange> {
        let request = self.build_request(body)?;
        let response = self.client.request(request).await.map_err(|e| self.transport(e))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            let id = response
                .headers()
                .get(SESSION_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or(RpcError::SessionConflict)?;
            return Ok(Exchange::SessionId(id));
        }
        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| self.transport(e))?
            .to_bytes();
        Ok(Exchange::Body(bytes))
    }

    fn build_request(&self, body: Bytes) -> RpcResult<Request<Full<Bytes>>> {
        let mut builder = Request::post(self.uri.clone()).header(CONTENT_TYPE, "application/json");
        if let Some(id) = self.session_id.borrow().as_deref() {
            builder = builder.header(SESSION_ID_HEADER, id);
        }
        if let Some(auth) = &self.authorization {
            builder = builder.header(AUTHORIZATION, auth.as_str());
        }
        builder.body(Full::new(body)).map_err(|e| self.transport(e))
    }

    fn transport(&self, error: impl std::fmt::Display) -> RpcError {
        RpcError::Transport {
            url: self.url.clone(),
            message: error.to_string(),
        }
    }
}

enum Exchange {
    SessionId(String),
    Body(Bytes),
}

impl TransferClient for TransmissionClient {
    fn list_transfers(&self) -> RpcResult<Vec<Transfer>> {
        let arguments: TorrentGetArguments =
            self.call("torrent-get", Some(json!({ "fields": TRANSFER_FIELDS })))?;
        debug!("Daemon reports {} transfer(s)", arguments.torrents.len());
        Ok(arguments.torrents)
    }

    fn close_session(&self) -> RpcResult<()> {
        self.call::<Value>("session-close", None).map(|_| ())
    }

    fn start_now(&self, ids: &[i64]) -> RpcResult<()> {
        self.call::<Value>("torrent-start-now", Some(json!({ "ids": ids })))
            .map(|_| ())
    }
}
