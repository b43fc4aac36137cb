use crate::core::BrokerSettings;
use crate::utils::error::{BrokerError, Result};
use crate::utils::validation::{
    validate_path, validate_range, validate_required_field, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_PER_PAGE: usize = 10;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub broker: BrokerSection,
    pub verifier: Option<VerifierConfig>,
    pub crawler: Option<CrawlerConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSection {
    pub name: Option<String>,
    /// 呼叫端接受未完成結果時是否回報非同步
    #[serde(default, rename = "async")]
    pub async_enabled: bool,
    pub catalog_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub server_url: String,
    pub server_alias: String,
    pub max_results: Option<usize>,
    pub per_page: Option<usize>,
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: Option<String>,
}

impl BrokerConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BrokerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| BrokerError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATAVERSE_URL})；未設定者保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn validate_config(&self) -> Result<()> {
        let catalog_path =
            validate_required_field("broker.catalog_path", &self.broker.catalog_path)?;
        validate_path("broker.catalog_path", catalog_path)?;

        validate_range("verifier.timeout_seconds", self.timeout_seconds(), 1, 300)?;

        if let Some(crawler) = &self.crawler {
            validate_url("crawler.server_url", &crawler.server_url)?;
            validate_path("crawler.output_dir", &crawler.output_dir)?;
            validate_range("crawler.per_page", self.per_page(), 1, 1000)?;
            if crawler.server_alias.trim().is_empty() {
                return Err(BrokerError::InvalidConfigValueError {
                    field: "crawler.server_alias".to_string(),
                    value: crawler.server_alias.clone(),
                    reason: "Alias cannot be empty".to_string(),
                });
            }
        }

        if let Some(format) = self.logging.as_ref().and_then(|l| l.format.as_deref()) {
            if !["compact", "json"].contains(&format) {
                return Err(BrokerError::InvalidConfigValueError {
                    field: "logging.format".to_string(),
                    value: format.to_string(),
                    reason: "Valid formats: compact, json".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn catalog_path(&self) -> Option<&str> {
        self.broker.catalog_path.as_deref()
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.verifier
            .as_ref()
            .and_then(|v| v.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn verifier_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.verifier.as_ref().and_then(|v| v.user_agent.as_deref())
    }

    pub fn per_page(&self) -> usize {
        self.crawler
            .as_ref()
            .and_then(|c| c.per_page)
            .unwrap_or(DEFAULT_PER_PAGE)
    }

    pub fn json_logging(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.format.as_deref()) == Some("json")
    }
}

impl BrokerSettings for BrokerConfig {
    fn async_enabled(&self) -> bool {
        self.broker.async_enabled
    }
}

impl Validate for BrokerConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
[broker]
name = "dataverse-broker"
async = true
catalog_path = "./whitelist"

[verifier]
timeout_seconds = 5
"#;

        let config = BrokerConfig::from_toml_str(toml_content).unwrap();

        assert!(config.async_enabled());
        assert_eq!(config.catalog_path(), Some("./whitelist"));
        assert_eq!(config.verifier_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config =
            BrokerConfig::from_toml_str("[broker]\ncatalog_path = \"./whitelist\"\n").unwrap();

        assert!(!config.async_enabled());
        assert_eq!(config.timeout_seconds(), DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(config.per_page(), DEFAULT_PER_PAGE);
        assert!(!config.json_logging());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_BROKER_CATALOG", "/srv/whitelist");

        let toml_content = r#"
[broker]
catalog_path = "${TEST_BROKER_CATALOG}"
"#;

        let config = BrokerConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.catalog_path(), Some("/srv/whitelist"));

        std::env::remove_var("TEST_BROKER_CATALOG");
    }

    #[test]
    fn test_config_validation() {
        let missing_catalog = BrokerConfig::from_toml_str("[broker]\nasync = false\n").unwrap();
        assert!(matches!(
            missing_catalog.validate(),
            Err(BrokerError::MissingConfigError { .. })
        ));

        let zero_timeout = BrokerConfig::from_toml_str(
            "[broker]\ncatalog_path = \"./w\"\n[verifier]\ntimeout_seconds = 0\n",
        )
        .unwrap();
        assert!(zero_timeout.validate().is_err());

        let bad_crawler = BrokerConfig::from_toml_str(
            r#"
[broker]
catalog_path = "./w"

[crawler]
server_url = "not-a-url"
server_alias = "demo"
output_dir = "./w"
"#,
        )
        .unwrap();
        assert!(bad_crawler.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = BrokerConfig::from_toml_str("[broker\ncatalog_path = ");
        assert!(matches!(result, Err(BrokerError::ConfigError { .. })));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[broker]
catalog_path = "./whitelist"

[crawler]
server_url = "https://demo.dataverse.org"
server_alias = "demo"
max_results = 10
output_dir = "./whitelist"

[logging]
format = "json"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = BrokerConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.crawler.as_ref().unwrap().server_alias, "demo");
        assert!(config.json_logging());
        assert!(config.validate().is_ok());
    }
}
