use crate::core::catalog::sanitize_name;
use crate::domain::model::OfferingDescriptor;
use crate::utils::error::{BrokerError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url};
use std::collections::{BTreeMap, HashSet};

/// Immutable service registry, keyed and ordered by service id.
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    offerings: BTreeMap<String, OfferingDescriptor>,
}

impl CatalogRegistry {
    /// 驗證完整性與唯一性後建立 registry；任何錯誤都不可在啟動後忽略
    pub fn new(descriptors: Vec<OfferingDescriptor>) -> Result<Self> {
        let mut offerings = BTreeMap::new();
        let mut plan_ids = HashSet::new();

        for descriptor in descriptors {
            check_complete(&descriptor)?;

            if !plan_ids.insert(descriptor.plan_id.clone()) {
                return Err(BrokerError::DuplicateDescriptor {
                    field: "plan_id".to_string(),
                    value: descriptor.plan_id,
                });
            }
            if offerings.contains_key(&descriptor.service_id) {
                return Err(BrokerError::DuplicateDescriptor {
                    field: "service_id".to_string(),
                    value: descriptor.service_id,
                });
            }

            offerings.insert(descriptor.service_id.clone(), descriptor);
        }

        tracing::debug!("Registry built with {} offerings", offerings.len());
        Ok(Self { offerings })
    }

    pub fn lookup(&self, service_id: &str) -> Option<&OfferingDescriptor> {
        self.offerings.get(service_id)
    }

    pub fn all(&self) -> impl Iterator<Item = &OfferingDescriptor> {
        self.offerings.values()
    }

    pub fn len(&self) -> usize {
        self.offerings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offerings.is_empty()
    }
}

fn check_complete(descriptor: &OfferingDescriptor) -> Result<()> {
    let invalid = |reason: String| BrokerError::InvalidDescriptor {
        service_id: descriptor.service_id.clone(),
        reason,
    };

    let required = [
        ("service_id", &descriptor.service_id),
        ("plan_id", &descriptor.plan_id),
        ("server_name", &descriptor.server_name),
        ("display_name", &descriptor.display_name),
    ];
    for (field, value) in required {
        validate_non_empty_string(field, value).map_err(|e| invalid(e.to_string()))?;
    }

    validate_url("server_url", &descriptor.server_url).map_err(|e| invalid(e.to_string()))?;
    if !descriptor.url.is_empty() {
        validate_url("url", &descriptor.url).map_err(|e| invalid(e.to_string()))?;
    }

    if sanitize_name(&descriptor.display_name).is_empty() {
        return Err(invalid(format!(
            "display name '{}' has no legal characters",
            descriptor.display_name
        )));
    }

    Ok(())
}
