use crate::core::ConfigProvider;
use crate::domain::model::{ProcessingMode, ReportShape};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONCURRENT_REQUESTS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub input: InputConfig,
    pub rate_service: RateServiceConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateServiceConfig {
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
    pub require_state_rate: Option<bool>,
    pub credentials: Option<CredentialsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub app_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub mode: Option<ProcessingMode>,
    pub concurrent_requests: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
    pub shape: Option<ReportShape>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// `${VAR}` is replaced from the environment; unset variables stay literal.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validation::validate_input_file("input.path", &self.input.path)?;
        validation::validate_url("rate_service.endpoint", &self.rate_service.endpoint)?;
        validation::validate_path("output.path", &self.output.path)?;

        if let Some(timeout) = self.rate_service.timeout_seconds {
            validation::validate_positive_number(
                "rate_service.timeout_seconds",
                timeout as usize,
                1,
            )?;
        }

        if let Some(concurrent) = self.processing.concurrent_requests {
            validation::validate_concurrency("processing.concurrent_requests", concurrent)?;
        }

        if let Some(credentials) = &self.rate_service.credentials {
            // 未設定的環境變數會原樣留下
            for (field, value) in [
                ("rate_service.credentials.app_id", &credentials.app_id),
                ("rate_service.credentials.api_key", &credentials.api_key),
            ] {
                validation::validate_non_empty_string(field, value)?;
                if value.starts_with("${") {
                    return Err(EtlError::MissingConfigError {
                        field: format!("{} (unresolved {})", field, value),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        &self.input.path
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn rate_endpoint(&self) -> &str {
        &self.rate_service.endpoint
    }

    fn app_id(&self) -> Option<&str> {
        self.rate_service
            .credentials
            .as_ref()
            .map(|c| c.app_id.as_str())
    }

    fn api_key(&self) -> Option<&str> {
        self.rate_service
            .credentials
            .as_ref()
            .map(|c| c.api_key.as_str())
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.rate_service.timeout_seconds.map(Duration::from_secs)
    }

    fn processing_mode(&self) -> ProcessingMode {
        self.processing.mode.unwrap_or(ProcessingMode::Sequential)
    }

    fn report_shape(&self) -> ReportShape {
        self.output.shape.unwrap_or(ReportShape::Fixed)
    }

    fn concurrent_requests(&self) -> usize {
        self.processing
            .concurrent_requests
            .unwrap_or(DEFAULT_CONCURRENT_REQUESTS)
    }

    fn require_state_rate(&self) -> bool {
        self.rate_service.require_state_rate.unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[pipeline]
name = "quarterly-taxes"

[input]
path = "data/clients.csv"

[rate_service]
endpoint = "https://rates.example.com/lookup"

[output]
path = "./output"
"#;

    #[test]
    fn test_parse_minimal_config_with_defaults() {
        let config = TomlConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.pipeline.name, "quarterly-taxes");
        assert_eq!(config.input_path(), "data/clients.csv");
        assert_eq!(config.processing_mode(), ProcessingMode::Sequential);
        assert_eq!(config.report_shape(), ReportShape::Fixed);
        assert_eq!(config.concurrent_requests(), DEFAULT_CONCURRENT_REQUESTS);
        assert!(config.app_id().is_none());
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[pipeline]
name = "quarterly-taxes"
description = "Q2 client charges"
version = "2.1"

[input]
path = "data/clients.csv"

[rate_service]
endpoint = "https://rates.example.com/lookup"
timeout_seconds = 15
require_state_rate = true

[rate_service.credentials]
app_id = "app-123"
api_key = "secret"

[processing]
mode = "parallel"
concurrent_requests = 20

[output]
path = "./reports"
shape = "dual"

[monitoring]
enabled = true
json_logs = true
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.processing_mode(), ProcessingMode::Parallel);
        assert_eq!(config.concurrent_requests(), 20);
        assert_eq!(config.report_shape(), ReportShape::Dual);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.app_id(), Some("app-123"));
        assert_eq!(config.api_key(), Some("secret"));
        assert!(config.require_state_rate());
        assert!(config.monitoring_enabled());
        assert!(config.json_logs());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SALES_TAX_TEST_API_KEY", "from-env");

        let toml_content = MINIMAL.replace(
            "endpoint = \"https://rates.example.com/lookup\"",
            "endpoint = \"https://rates.example.com/lookup\"\n\n[rate_service.credentials]\napp_id = \"app\"\napi_key = \"${SALES_TAX_TEST_API_KEY}\"",
        );

        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.api_key(), Some("from-env"));

        std::env::remove_var("SALES_TAX_TEST_API_KEY");
    }

    #[test]
    fn test_unresolved_credential_fails_validation() {
        let toml_content = MINIMAL.replace(
            "endpoint = \"https://rates.example.com/lookup\"",
            "endpoint = \"https://rates.example.com/lookup\"\n\n[rate_service.credentials]\napp_id = \"app\"\napi_key = \"${SALES_TAX_SURELY_UNSET_VAR}\"",
        );

        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(EtlError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_unknown_shape_fails_to_parse() {
        let toml_content = MINIMAL.replace("path = \"./output\"", "path = \"./output\"\nshape = \"pdf\"");
        assert!(matches!(
            TomlConfig::from_toml_str(&toml_content),
            Err(EtlError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        let bad_endpoint = MINIMAL.replace("https://rates.example.com/lookup", "invalid-url");
        let config = TomlConfig::from_toml_str(&bad_endpoint).unwrap();
        assert!(config.validate().is_err());

        let bad_input = MINIMAL.replace("data/clients.csv", "data/clients.json");
        let config = TomlConfig::from_toml_str(&bad_input).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.name, "quarterly-taxes");
    }
}
