use crate::utils::error::Result;
use async_trait::async_trait;

/// 佈建前對後端 Dataverse 伺服器的同步檢查
#[async_trait]
pub trait RemoteVerifier: Send + Sync {
    /// `BackendUnreachable` on transport failure or a 404.
    async fn ping_liveness(&self, url: &str) -> Result<()>;

    /// `InvalidCredential` unless the server answers with status "OK".
    async fn ping_credential(&self, server_url: &str, token: &str) -> Result<()>;
}

pub trait BrokerSettings: Send + Sync {
    fn async_enabled(&self) -> bool;
}
