use crate::core::registry::CatalogRegistry;
use crate::domain::model::OfferingDescriptor;
use crate::domain::ports::RemoteVerifier;
use crate::utils::error::{BrokerError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// 單一檔案可放一筆描述或一個陣列
#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptorFile {
    Many(Vec<OfferingDescriptor>),
    One(Box<OfferingDescriptor>),
}

/// Read descriptors from a JSON file, or from every `*.json` file in a
/// directory (in file-name order).
pub fn load_descriptors<P: AsRef<Path>>(path: P) -> Result<Vec<OfferingDescriptor>> {
    let path = path.as_ref();

    if !path.is_dir() {
        return read_descriptor_file(path);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();

    let mut descriptors = Vec::new();
    for file in &files {
        descriptors.extend(read_descriptor_file(file)?);
    }

    tracing::debug!(
        "Read {} descriptors from {} files in {}",
        descriptors.len(),
        files.len(),
        path.display()
    );
    Ok(descriptors)
}

/// Load and validate the registry. Any error here must stop startup.
pub fn load_registry<P: AsRef<Path>>(path: P) -> Result<CatalogRegistry> {
    let path = path.as_ref();
    tracing::info!("📁 Loading service registry from: {}", path.display());

    let registry = CatalogRegistry::new(load_descriptors(path)?)?;

    tracing::info!("✅ Loaded {} Dataverse services", registry.len());
    Ok(registry)
}

/// Liveness-check every descriptor's coordinates. Returns the failures as
/// `(service_id, error)` pairs; an empty list means every backend answered.
pub async fn ping_registry<V: RemoteVerifier>(
    registry: &CatalogRegistry,
    verifier: &V,
) -> Vec<(String, BrokerError)> {
    let mut failures = Vec::new();
    for descriptor in registry.all() {
        match verifier.ping_liveness(descriptor.coordinates()).await {
            Ok(()) => tracing::debug!("✅ {} is reachable", descriptor.service_id),
            Err(e) => {
                tracing::warn!("❌ {} failed the liveness check: {}", descriptor.service_id, e);
                failures.push((descriptor.service_id.clone(), e));
            }
        }
    }
    failures
}

fn read_descriptor_file(path: &Path) -> Result<Vec<OfferingDescriptor>> {
    let content = fs::read(path)?;
    let parsed: DescriptorFile = serde_json::from_slice(&content).map_err(|e| {
        tracing::error!("❌ Malformed descriptor file {}: {}", path.display(), e);
        BrokerError::SerializationError(e)
    })?;

    Ok(match parsed {
        DescriptorFile::Many(list) => list,
        DescriptorFile::One(single) => vec![*single],
    })
}

/// 以 `<service_id>.json` 寫出一筆描述
pub fn write_descriptor<P: AsRef<Path>>(
    dir: P,
    descriptor: &OfferingDescriptor,
) -> Result<PathBuf> {
    let id = &descriptor.service_id;
    if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
        return Err(BrokerError::InvalidDescriptor {
            service_id: id.clone(),
            reason: "service id is not usable as a file name".to_string(),
        });
    }

    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let target = dir.join(format!("{}.json", id));
    fs::write(&target, serde_json::to_vec_pretty(descriptor)?)?;
    Ok(target)
}

pub fn write_descriptors<P: AsRef<Path>>(
    dir: P,
    descriptors: &[OfferingDescriptor],
) -> Result<Vec<PathBuf>> {
    descriptors
        .iter()
        .map(|d| write_descriptor(dir.as_ref(), d))
        .collect()
}
