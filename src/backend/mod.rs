use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::ServerVersion;

pub mod jsonrpc;

/// Credentials attached to every model call once authenticated
#[derive(Debug, Clone)]
pub struct Session {
    pub db: String,
    pub uid: i64,
    pub password: String,
}

/// Remote Odoo API surface used by the sync client
#[async_trait]
pub trait Backend: Send + Sync {
    /// Report the server version (`common.version`)
    async fn version(&self) -> Result<ServerVersion>;

    /// Log in and return the user id, or `None` when the credentials are rejected
    async fn authenticate(&self, db: &str, login: &str, password: &str) -> Result<Option<i64>>;

    /// Call a model method (`object.execute_kw`)
    async fn execute_kw(
        &self,
        session: &Session,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: serde_json::Map<String, Value>,
    ) -> Result<Value>;
}
