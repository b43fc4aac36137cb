use crate::domain::model::InstanceRecord;
use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

/// Process-lifetime instance map behind a single lock.
#[derive(Debug, Default)]
pub struct InstanceStore {
    instances: Mutex<HashMap<String, InstanceRecord>>,
}

/// 持有鎖期間的視圖，用於 check-then-insert
pub struct StoreGuard<'a> {
    instances: MutexGuard<'a, HashMap<String, InstanceRecord>>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> StoreGuard<'_> {
        StoreGuard {
            instances: self.instances.lock().await,
        }
    }

    pub async fn get(&self, instance_id: &str) -> Option<InstanceRecord> {
        self.lock().await.get(instance_id).cloned()
    }

    pub async fn insert(&self, record: InstanceRecord) {
        self.lock().await.insert(record);
    }

    pub async fn remove(&self, instance_id: &str) -> Option<InstanceRecord> {
        self.lock().await.remove(instance_id)
    }

    pub async fn len(&self) -> usize {
        self.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl StoreGuard<'_> {
    pub fn get(&self, instance_id: &str) -> Option<&InstanceRecord> {
        self.instances.get(instance_id)
    }

    /// Unconditional overwrite; conflicts must be checked by the caller.
    pub fn insert(&mut self, record: InstanceRecord) {
        self.instances.insert(record.instance_id.clone(), record);
    }

    /// 不存在時為 no-op
    pub fn remove(&mut self, instance_id: &str) -> Option<InstanceRecord> {
        self.instances.remove(instance_id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
