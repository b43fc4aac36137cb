use crate::utils::error::{BrokerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 一個可供佈建的 Dataverse 服務描述 (registry 載入後不可變)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferingDescriptor {
    pub service_id: String,
    pub plan_id: String,
    pub server_name: String,
    pub server_url: String,
    pub display_name: String,
    #[serde(default)]
    pub identifier: String,
    /// Dataverse 本身的網址；為空時退回 `server_url`
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
}

impl OfferingDescriptor {
    /// Liveness probe target and bind coordinates.
    pub fn coordinates(&self) -> &str {
        if self.url.is_empty() {
            &self.server_url
        } else {
            &self.url
        }
    }
}

/// Caller-supplied parameter bag. The only recognized key is `credentials`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, Value>);

impl Parameters {
    pub const CREDENTIALS: &'static str = "credentials";

    pub fn new() -> Self {
        Self::default()
    }

    /// 在邊界驗證參數：`credentials` 若存在必須是字串
    pub fn from_map(map: BTreeMap<String, Value>) -> Result<Self> {
        match map.get(Self::CREDENTIALS) {
            None | Some(Value::String(_)) | Some(Value::Null) => Ok(Self(map)),
            Some(other) => Err(BrokerError::InvalidParameters {
                message: format!("'credentials' must be a string, got {}", other),
            }),
        }
    }

    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(obj) => Self::from_map(obj.into_iter().collect()),
            other => Err(BrokerError::InvalidParameters {
                message: format!("parameters must be a JSON object, got {}", other),
            }),
        }
    }

    pub fn with_credentials(token: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(Self::CREDENTIALS.to_string(), Value::String(token.into()));
        Self(map)
    }

    pub fn credentials(&self) -> Option<&str> {
        self.0.get(Self::CREDENTIALS).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub server_name: String,
    pub server_url: String,
    pub coordinates: String,
    pub description: String,
    pub params: Parameters,
}

impl InstanceRecord {
    pub fn new(
        instance_id: &str,
        plan_id: &str,
        offering: &OfferingDescriptor,
        params: Parameters,
    ) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            service_id: offering.service_id.clone(),
            plan_id: plan_id.to_string(),
            server_name: offering.server_name.clone(),
            server_url: offering.server_url.clone(),
            coordinates: offering.coordinates().to_string(),
            description: offering.description.clone(),
            params,
        }
    }

    /// 冪等判斷：逐欄位比較
    pub fn matches(&self, other: &InstanceRecord) -> bool {
        self.instance_id == other.instance_id
            && self.service_id == other.service_id
            && self.plan_id == other.plan_id
            && self.server_name == other.server_name
            && self.server_url == other.server_url
            && self.coordinates == other.coordinates
            && self.description == other.description
            && self.params == other.params
    }
}

#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub accepts_incomplete: bool,
    pub params: Parameters,
}

#[derive(Debug, Clone)]
pub struct DeprovisionRequest {
    pub instance_id: String,
    pub accepts_incomplete: bool,
}

#[derive(Debug, Clone)]
pub struct BindRequest {
    pub instance_id: String,
    pub binding_id: String,
    pub accepts_incomplete: bool,
    pub params: Parameters,
}

#[derive(Debug, Clone)]
pub struct UnbindRequest {
    pub instance_id: String,
    pub binding_id: String,
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: Option<String>,
    pub accepts_incomplete: bool,
    pub params: Parameters,
}

#[derive(Debug, Clone)]
pub struct LastOperationRequest {
    pub instance_id: String,
    pub operation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionResponse {
    pub exists: bool,
    #[serde(rename = "async")]
    pub is_async: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeprovisionResponse {
    #[serde(rename = "async")]
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindCredentials {
    pub coordinates: String,
    pub credentials: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindResponse {
    pub credentials: BindCredentials,
    #[serde(rename = "async")]
    pub is_async: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnbindResponse {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogResponse {
    pub services: Vec<CatalogService>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogService {
    pub name: String,
    pub id: String,
    pub description: String,
    pub bindable: bool,
    pub plan_updatable: bool,
    pub metadata: ServiceMetadata,
    pub plans: Vec<CatalogPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceMetadata {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogPlan {
    pub id: String,
    pub name: String,
    pub description: String,
    pub free: bool,
    pub schemas: PlanSchemas,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSchemas {
    pub service_instance: ServiceInstanceSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceInstanceSchema {
    pub create: InputParametersSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputParametersSchema {
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offering() -> OfferingDescriptor {
        OfferingDescriptor {
            service_id: "svc-A".to_string(),
            plan_id: "plan-A".to_string(),
            server_name: "demo".to_string(),
            server_url: "http://backend.example".to_string(),
            display_name: "Demo Dataverse".to_string(),
            identifier: String::new(),
            url: String::new(),
            description: String::new(),
            image_url: String::new(),
        }
    }

    #[test]
    fn test_coordinates_fall_back_to_server_url() {
        let mut descriptor = offering();
        assert_eq!(descriptor.coordinates(), "http://backend.example");

        descriptor.url = "http://backend.example/dataverse/demo".to_string();
        assert_eq!(descriptor.coordinates(), "http://backend.example/dataverse/demo");
    }

    #[test]
    fn test_parameters_reject_non_string_credentials() {
        let result = Parameters::from_json(json!({"credentials": 42}));
        assert!(matches!(result, Err(BrokerError::InvalidParameters { .. })));

        let result = Parameters::from_json(json!(["credentials"]));
        assert!(matches!(result, Err(BrokerError::InvalidParameters { .. })));
    }

    #[test]
    fn test_parameters_credentials_accessor() {
        let params = Parameters::from_json(json!({"credentials": "tok", "other": 1})).unwrap();
        assert_eq!(params.credentials(), Some("tok"));
        assert_eq!(params.get("other"), Some(&json!(1)));

        assert_eq!(Parameters::from_json(Value::Null).unwrap().credentials(), None);
        assert_eq!(
            Parameters::from_json(json!({"credentials": null})).unwrap().credentials(),
            None
        );
    }

    #[test]
    fn test_record_matches_compares_every_field() {
        let a = InstanceRecord::new("i1", "plan-A", &offering(), Parameters::new());
        let b = InstanceRecord::new("i1", "plan-A", &offering(), Parameters::new());
        assert!(a.matches(&b));

        let other_plan = InstanceRecord::new("i1", "plan-B", &offering(), Parameters::new());
        assert!(!a.matches(&other_plan));

        let other_params =
            InstanceRecord::new("i1", "plan-A", &offering(), Parameters::with_credentials("tok"));
        assert!(!a.matches(&other_params));
    }

    #[test]
    fn test_async_flag_serializes_as_async() {
        let response = ProvisionResponse {
            exists: true,
            is_async: false,
        };
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({"exists": true, "async": false})
        );
    }
}
