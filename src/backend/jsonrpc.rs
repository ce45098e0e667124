use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{Backend, Session};
use crate::error::{Result, SyncError};
use crate::types::ServerVersion;

/// Odoo backend speaking JSON-RPC on `{url}/jsonrpc`
pub struct JsonRpcBackend {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RpcParams<'a>,
    id: u64,
}

#[derive(Serialize)]
struct RpcParams<'a> {
    service: &'a str,
    method: &'a str,
    args: Vec<Value>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcFault>,
}

#[derive(Deserialize)]
struct RpcFault {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<RpcFaultData>,
}

#[derive(Deserialize)]
struct RpcFaultData {
    #[serde(default)]
    message: Option<String>,
}

impl JsonRpcBackend {
    /// Create a backend for the server at `url` (e.g. `https://example.odoo.com`)
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("odoo-task-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/jsonrpc", url.trim_end_matches('/')),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service,
                method,
                args,
            },
            id,
        };

        debug!(service, method, id, "calling {}", self.endpoint);

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Http { status, body });
        }

        let body: Value = response.json().await?;
        decode_response(body)
    }
}

/// Extract the result of a JSON-RPC response body, turning faults into errors
fn decode_response(body: Value) -> Result<Value> {
    let response: RpcResponse = serde_json::from_value(body)
        .map_err(|e| SyncError::Protocol(format!("malformed JSON-RPC response: {e}")))?;

    if let Some(fault) = response.error {
        let message = fault
            .data
            .and_then(|d| d.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(fault.message);
        return Err(SyncError::Fault {
            code: fault.code,
            message,
        });
    }

    Ok(response.result.unwrap_or(Value::Null))
}

/// `authenticate` answers with the uid, or `false` when the login is refused
fn parse_uid(value: &Value) -> Option<i64> {
    value.as_i64().filter(|uid| *uid > 0)
}

#[async_trait]
impl Backend for JsonRpcBackend {
    async fn version(&self) -> Result<ServerVersion> {
        let value = self.call("common", "version", Vec::new()).await?;
        serde_json::from_value(value)
            .map_err(|e| SyncError::Protocol(format!("unreadable version payload: {e}")))
    }

    async fn authenticate(&self, db: &str, login: &str, password: &str) -> Result<Option<i64>> {
        let value = self
            .call(
                "common",
                "authenticate",
                vec![json!(db), json!(login), json!(password), json!({})],
            )
            .await?;
        Ok(parse_uid(&value))
    }

    async fn execute_kw(
        &self,
        session: &Session,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: serde_json::Map<String, Value>,
    ) -> Result<Value> {
        self.call(
            "object",
            "execute_kw",
            vec![
                json!(session.db),
                json!(session.uid),
                json!(session.password),
                json!(model),
                json!(method),
                Value::Array(args),
                Value::Object(kwargs),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_result() {
        let value = decode_response(json!({"jsonrpc": "2.0", "id": 1, "result": [1, 2]})).unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn test_decode_fault_prefers_data_message() {
        let err = decode_response(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": {
                "code": 200,
                "message": "Odoo Server Error",
                "data": {"name": "odoo.exceptions.AccessError", "message": "You are not allowed"}
            }
        }))
        .unwrap_err();

        match err {
            SyncError::Fault { code, message } => {
                assert_eq!(code, 200);
                assert_eq!(message, "You are not allowed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_fault_without_data() {
        let err = decode_response(json!({"error": {"code": 100, "message": "Session expired"}})).unwrap_err();
        assert!(matches!(err, SyncError::Fault { code: 100, ref message } if message == "Session expired"));
    }

    #[test]
    fn test_decode_null_result() {
        assert_eq!(decode_response(json!({"id": 1, "result": null})).unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_uid() {
        assert_eq!(parse_uid(&json!(7)), Some(7));
        assert_eq!(parse_uid(&json!(false)), None);
        assert_eq!(parse_uid(&json!(0)), None);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let backend = JsonRpcBackend::new("https://demo.odoo.com/").unwrap();
        assert_eq!(backend.endpoint, "https://demo.odoo.com/jsonrpc");
    }
}
