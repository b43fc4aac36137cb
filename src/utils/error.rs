use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Invalid Dataverse service: {service_id}")]
    InvalidReference { service_id: String },

    #[error("InstanceID in use: {instance_id}")]
    Conflict { instance_id: String },

    #[error("Could not reach server {url}: {reason}")]
    BackendUnreachable { url: String, reason: String },

    #[error("Credential rejected by server: {message}")]
    InvalidCredential { message: String },

    #[error("Instance not found: {instance_id}")]
    InstanceNotFound { instance_id: String },

    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("Invalid service descriptor '{service_id}': {reason}")]
    InvalidDescriptor { service_id: String, reason: String },

    #[error("Duplicate {field} '{value}' in registry")]
    DuplicateDescriptor { field: String, value: String },

    #[error("Dataverse search failed: {message}")]
    SearchError { message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

impl BrokerError {
    /// 對應到協定邊界的 HTTP 狀態碼
    pub fn status_code(&self) -> u16 {
        match self {
            BrokerError::InvalidReference { .. } | BrokerError::Conflict { .. } => 409,
            BrokerError::BackendUnreachable { .. } | BrokerError::InstanceNotFound { .. } => 404,
            BrokerError::InvalidCredential { .. } | BrokerError::InvalidParameters { .. } => 400,
            BrokerError::Unsupported { .. } => 422,
            _ => 500,
        }
    }

    /// 啟動時發生即不可繼續提供服務的錯誤 (registry 或配置)
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            BrokerError::InvalidDescriptor { .. }
                | BrokerError::DuplicateDescriptor { .. }
                | BrokerError::IoError(_)
                | BrokerError::SerializationError(_)
                | BrokerError::ConfigError { .. }
                | BrokerError::InvalidConfigValueError { .. }
                | BrokerError::MissingConfigError { .. }
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BrokerError::InvalidCredential { message } => {
                format!("The Dataverse server rejected the supplied credentials: {}", message)
            }
            BrokerError::BackendUnreachable { url, .. } => {
                format!("The Dataverse server at {} could not be reached", url)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
