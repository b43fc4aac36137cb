use crate::core::catalog::synthesize_catalog;
use crate::core::registry::CatalogRegistry;
use crate::core::store::{InstanceStore, StoreGuard};
use crate::domain::model::{
    BindCredentials, BindRequest, BindResponse, CatalogResponse, DeprovisionRequest,
    DeprovisionResponse, InstanceRecord, LastOperationRequest, ProvisionRequest,
    ProvisionResponse, UnbindRequest, UnbindResponse, UpdateRequest,
};
use crate::domain::ports::{BrokerSettings, RemoteVerifier};
use crate::utils::error::{BrokerError, Result};
use std::sync::Arc;

/// Orchestrates the provision / bind / deprovision lifecycle.
///
/// The store lock is only held for the short read-check-write sections;
/// backend verification always runs with the lock released.
pub struct Broker<V: RemoteVerifier, C: BrokerSettings> {
    registry: Arc<CatalogRegistry>,
    store: InstanceStore,
    verifier: V,
    config: C,
}

/// 已存在的 instance 對新請求的判定結果
enum Existing {
    Absent,
    Identical,
}

impl<V: RemoteVerifier, C: BrokerSettings> Broker<V, C> {
    pub fn new(registry: Arc<CatalogRegistry>, verifier: V, config: C) -> Self {
        Self {
            registry,
            store: InstanceStore::new(),
            verifier,
            config,
        }
    }

    pub fn registry(&self) -> &CatalogRegistry {
        &self.registry
    }

    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    fn async_flag(&self, accepts_incomplete: bool) -> bool {
        accepts_incomplete && self.config.async_enabled()
    }

    pub fn get_catalog(&self) -> Result<CatalogResponse> {
        let catalog = synthesize_catalog(&self.registry)?;
        tracing::debug!("Catalog response with {} services", catalog.services.len());
        Ok(catalog)
    }

    pub async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionResponse> {
        tracing::info!(
            "provision request: instance={} service={} plan={}",
            request.instance_id,
            request.service_id,
            request.plan_id
        );

        let offering = self.registry.lookup(&request.service_id).ok_or_else(|| {
            tracing::warn!("❌ Unknown service id: {}", request.service_id);
            BrokerError::InvalidReference {
                service_id: request.service_id.clone(),
            }
        })?;

        let candidate = InstanceRecord::new(
            &request.instance_id,
            &request.plan_id,
            offering,
            request.params.clone(),
        );

        // 先檢查既有 instance：相同則冪等成功，不同則衝突
        {
            let guard = self.store.lock().await;
            if let Existing::Identical = check_existing(&guard, &candidate)? {
                tracing::info!("Instance {} already provisioned", request.instance_id);
                return Ok(ProvisionResponse {
                    exists: true,
                    is_async: false,
                });
            }
        }

        if request.plan_id != offering.plan_id {
            tracing::warn!(
                "❌ Plan {} does not belong to service {}",
                request.plan_id,
                request.service_id
            );
            return Err(BrokerError::InvalidReference {
                service_id: request.service_id.clone(),
            });
        }

        // 網路驗證期間不持有鎖
        self.verifier.ping_liveness(&candidate.coordinates).await?;
        if let Some(token) = candidate.params.credentials().filter(|t| !t.is_empty()) {
            self.verifier
                .ping_credential(&candidate.server_url, token)
                .await?;
        }

        let mut guard = self.store.lock().await;
        // 驗證期間可能有另一個 provision 搶先寫入
        if let Existing::Identical = check_existing(&guard, &candidate)? {
            tracing::info!(
                "Instance {} was provisioned concurrently with identical parameters",
                request.instance_id
            );
            return Ok(ProvisionResponse {
                exists: true,
                is_async: false,
            });
        }
        guard.insert(candidate);
        drop(guard);

        let response = ProvisionResponse {
            exists: false,
            is_async: self.async_flag(request.accepts_incomplete),
        };
        tracing::info!("✅ provision response: {:?}", response);
        Ok(response)
    }

    pub async fn deprovision(&self, request: DeprovisionRequest) -> Result<DeprovisionResponse> {
        let removed = self.store.lock().await.remove(&request.instance_id);
        match removed {
            Some(_) => tracing::info!("Instance {} deprovisioned", request.instance_id),
            None => tracing::debug!(
                "Deprovision of unknown instance {} is a no-op",
                request.instance_id
            ),
        }

        Ok(DeprovisionResponse {
            is_async: self.async_flag(request.accepts_incomplete),
        })
    }

    pub async fn bind(&self, request: BindRequest) -> Result<BindResponse> {
        tracing::info!(
            "bind request: instance={} binding={}",
            request.instance_id,
            request.binding_id
        );

        let credentials = {
            let guard = self.store.lock().await;
            let instance =
                guard
                    .get(&request.instance_id)
                    .ok_or_else(|| BrokerError::InstanceNotFound {
                        instance_id: request.instance_id.clone(),
                    })?;

            BindCredentials {
                coordinates: instance.coordinates.clone(),
                credentials: instance.params.credentials().unwrap_or_default().to_string(),
            }
        };

        Ok(BindResponse {
            credentials,
            is_async: self.async_flag(request.accepts_incomplete),
        })
    }

    /// Always succeeds: no binding state is kept, so there is nothing to check.
    pub async fn unbind(&self, request: UnbindRequest) -> Result<UnbindResponse> {
        tracing::debug!(
            "unbind request: instance={} binding={}",
            request.instance_id,
            request.binding_id
        );
        Ok(UnbindResponse {})
    }

    pub async fn update(&self, request: UpdateRequest) -> Result<ProvisionResponse> {
        tracing::warn!("Rejecting update of instance {}", request.instance_id);
        Err(BrokerError::Unsupported {
            operation: "update".to_string(),
        })
    }

    pub async fn last_operation(&self, request: LastOperationRequest) -> Result<()> {
        tracing::warn!(
            "Rejecting last_operation poll for instance {} (operation {:?})",
            request.instance_id,
            request.operation
        );
        Err(BrokerError::Unsupported {
            operation: "last_operation".to_string(),
        })
    }
}

fn check_existing(guard: &StoreGuard<'_>, candidate: &InstanceRecord) -> Result<Existing> {
    match guard.get(&candidate.instance_id) {
        None => Ok(Existing::Absent),
        Some(existing) if existing.matches(candidate) => Ok(Existing::Identical),
        Some(_) => {
            tracing::warn!("❌ InstanceID in use: {}", candidate.instance_id);
            Err(BrokerError::Conflict {
                instance_id: candidate.instance_id.clone(),
            })
        }
    }
}
