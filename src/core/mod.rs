pub mod catalog;
pub mod lifecycle;
pub mod registry;
pub mod store;

pub use crate::domain::model::{InstanceRecord, OfferingDescriptor, Parameters};
pub use crate::domain::ports::{BrokerSettings, RemoteVerifier};
pub use crate::utils::error::Result;
