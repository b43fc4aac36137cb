use crate::core::lifecycle::Broker;
use crate::domain::model::{
    BindRequest, DeprovisionRequest, LastOperationRequest, Parameters, ProvisionRequest,
    UnbindRequest, UpdateRequest,
};
use crate::domain::ports::{BrokerSettings, RemoteVerifier};
use crate::utils::error::{BrokerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// One lifecycle call per input line.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SessionRequest {
    Catalog,
    Provision {
        instance_id: String,
        service_id: String,
        plan_id: String,
        #[serde(default)]
        accepts_incomplete: bool,
        #[serde(default)]
        parameters: Value,
    },
    Deprovision {
        instance_id: String,
        #[serde(default)]
        accepts_incomplete: bool,
    },
    Bind {
        instance_id: String,
        binding_id: String,
        #[serde(default)]
        accepts_incomplete: bool,
        #[serde(default)]
        parameters: Value,
    },
    Unbind {
        instance_id: String,
        binding_id: String,
    },
    Update {
        instance_id: String,
        service_id: String,
        plan_id: Option<String>,
        #[serde(default)]
        accepts_incomplete: bool,
        #[serde(default)]
        parameters: Value,
    },
    LastOperation {
        instance_id: String,
        operation: Option<String>,
    },
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SessionReply {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionReply {
    fn ok(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            error: None,
        }
    }

    fn failed(err: &BrokerError) -> Self {
        Self {
            status: err.status_code(),
            body: None,
            error: Some(err.user_friendly_message()),
        }
    }
}

pub async fn dispatch<V: RemoteVerifier, C: BrokerSettings>(
    broker: &Broker<V, C>,
    request: SessionRequest,
) -> SessionReply {
    match execute(broker, request).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::warn!("Request failed with {}: {}", err.status_code(), err);
            SessionReply::failed(&err)
        }
    }
}

async fn execute<V: RemoteVerifier, C: BrokerSettings>(
    broker: &Broker<V, C>,
    request: SessionRequest,
) -> Result<SessionReply> {
    let reply = match request {
        SessionRequest::Catalog => {
            SessionReply::ok(200, serde_json::to_value(broker.get_catalog()?)?)
        }
        SessionRequest::Provision {
            instance_id,
            service_id,
            plan_id,
            accepts_incomplete,
            parameters,
        } => {
            // 未知服務一律 InvalidReference，不論參數內容
            if broker.registry().lookup(&service_id).is_none() {
                return Err(BrokerError::InvalidReference { service_id });
            }
            let response = broker
                .provision(ProvisionRequest {
                    instance_id,
                    service_id,
                    plan_id,
                    accepts_incomplete,
                    params: Parameters::from_json(parameters)?,
                })
                .await?;
            // 既存 200、非同步 202、新建 201
            let status = match (response.exists, response.is_async) {
                (true, _) => 200,
                (false, true) => 202,
                (false, false) => 201,
            };
            SessionReply::ok(status, serde_json::to_value(response)?)
        }
        SessionRequest::Deprovision {
            instance_id,
            accepts_incomplete,
        } => {
            let response = broker
                .deprovision(DeprovisionRequest {
                    instance_id,
                    accepts_incomplete,
                })
                .await?;
            let status = if response.is_async { 202 } else { 200 };
            SessionReply::ok(status, serde_json::to_value(response)?)
        }
        SessionRequest::Bind {
            instance_id,
            binding_id,
            accepts_incomplete,
            parameters,
        } => {
            let response = broker
                .bind(BindRequest {
                    instance_id,
                    binding_id,
                    accepts_incomplete,
                    params: Parameters::from_json(parameters)?,
                })
                .await?;
            SessionReply::ok(201, serde_json::to_value(response)?)
        }
        SessionRequest::Unbind {
            instance_id,
            binding_id,
        } => {
            let response = broker
                .unbind(UnbindRequest {
                    instance_id,
                    binding_id,
                })
                .await?;
            SessionReply::ok(200, serde_json::to_value(response)?)
        }
        SessionRequest::Update {
            instance_id,
            service_id,
            plan_id,
            accepts_incomplete,
            parameters,
        } => {
            let response = broker
                .update(UpdateRequest {
                    instance_id,
                    service_id,
                    plan_id,
                    accepts_incomplete,
                    params: Parameters::from_json(parameters)?,
                })
                .await?;
            SessionReply::ok(200, serde_json::to_value(response)?)
        }
        SessionRequest::LastOperation {
            instance_id,
            operation,
        } => {
            broker
                .last_operation(LastOperationRequest {
                    instance_id,
                    operation,
                })
                .await?;
            SessionReply::ok(200, Value::Null)
        }
    };

    Ok(reply)
}

/// Serve JSON-lines requests until EOF. Returns the number of requests handled.
pub async fn run_session<R, W, V, C>(
    broker: &Broker<V, C>,
    reader: R,
    mut writer: W,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    V: RemoteVerifier,
    C: BrokerSettings,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<SessionRequest>(&line) {
            Ok(request) => dispatch(broker, request).await,
            Err(e) => SessionReply {
                status: 400,
                body: None,
                error: Some(format!("Malformed request: {}", e)),
            },
        };

        let mut encoded = serde_json::to_vec(&reply)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        handled += 1;
    }

    tracing::debug!("Session closed after {} requests", handled);
    Ok(handled)
}
