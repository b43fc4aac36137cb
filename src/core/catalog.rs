use crate::core::registry::CatalogRegistry;
use crate::domain::model::{
    CatalogPlan, CatalogResponse, CatalogService, InputParametersSchema, OfferingDescriptor,
    PlanSchemas, ServiceInstanceSchema, ServiceMetadata,
};
use crate::utils::error::{BrokerError, Result};
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

pub const DEFAULT_DESCRIPTION: &str = "A Dataverse service";
pub const DEFAULT_IMAGE_URL: &str = "https://avatars2.githubusercontent.com/u/19862012?s=200&v=4";
pub const DEFAULT_PLAN_NAME: &str = "default";

static ILLEGAL_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\-.]+").expect("static regex"));

/// 服務名稱只允許英數、dash 與句點
pub fn sanitize_name(display_name: &str) -> String {
    let dashed = display_name.replace(' ', "-");
    ILLEGAL_NAME_CHARS.replace_all(&dashed, "").to_lowercase()
}

/// Build the catalog for every registered offering.
///
/// Any descriptor whose name sanitizes to nothing fails the whole build, so
/// a catalog is either complete or absent.
pub fn synthesize_catalog(registry: &CatalogRegistry) -> Result<CatalogResponse> {
    let services = registry
        .all()
        .map(catalog_service)
        .collect::<Result<Vec<_>>>()?;

    Ok(CatalogResponse { services })
}

pub fn catalog_service(offering: &OfferingDescriptor) -> Result<CatalogService> {
    let name = sanitize_name(&offering.display_name);
    if name.is_empty() {
        return Err(BrokerError::InvalidDescriptor {
            service_id: offering.service_id.clone(),
            reason: format!(
                "display name '{}' sanitizes to an empty service name",
                offering.display_name
            ),
        });
    }

    let description = if offering.description.is_empty() {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        offering.description.clone()
    };

    let image_url = if offering.image_url.is_empty() {
        DEFAULT_IMAGE_URL.to_string()
    } else {
        offering.image_url.clone()
    };

    Ok(CatalogService {
        name,
        id: offering.service_id.clone(),
        description,
        bindable: true,
        plan_updatable: true,
        metadata: ServiceMetadata {
            display_name: offering.display_name.clone(),
            image_url,
        },
        plans: vec![default_plan(offering)],
    })
}

fn default_plan(offering: &OfferingDescriptor) -> CatalogPlan {
    CatalogPlan {
        id: offering.plan_id.clone(),
        name: DEFAULT_PLAN_NAME.to_string(),
        description: format!("The default plan for {}", offering.display_name),
        free: true,
        schemas: PlanSchemas {
            service_instance: ServiceInstanceSchema {
                create: InputParametersSchema {
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "credentials": {
                                "type": "string",
                                "description": "API key to access restricted files and datasets on Dataverse",
                                "default": ""
                            }
                        }
                    }),
                },
            },
        },
    }
}
