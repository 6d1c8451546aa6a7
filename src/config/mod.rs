pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli_config::CliConfig;

#[cfg(feature = "cli")]
mod cli_config {
    use crate::core::ConfigProvider;
    use crate::domain::model::{ProcessingMode, ReportShape};
    use crate::utils::error::Result;
    use crate::utils::validation::{self, Validate};
    use clap::Parser;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Clone, Serialize, Deserialize, Parser)]
    #[command(name = "sales-tax-etl")]
    #[command(about = "Enrich a client charge sheet with sales tax per jurisdiction")]
    pub struct CliConfig {
        /// Charge sheet to process (.csv)
        #[arg(long)]
        pub input_path: String,

        #[arg(long, default_value = "./output")]
        pub output_path: String,

        #[arg(long)]
        pub rate_endpoint: String,

        #[arg(long)]
        pub app_id: Option<String>,

        #[arg(long)]
        pub api_key: Option<String>,

        /// sequential or parallel
        #[arg(long, default_value = "sequential")]
        pub mode: ProcessingMode,

        /// fixed, dynamic or dual
        #[arg(long, default_value = "fixed")]
        pub shape: ReportShape,

        #[arg(long, default_value = "10")]
        pub concurrent_requests: usize,

        /// Per-request timeout for the rate service
        #[arg(long)]
        pub timeout_seconds: Option<u64>,

        /// Fail addresses whose state rate is missing or zero
        #[arg(long)]
        pub require_state_rate: bool,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Log CPU and memory usage per phase")]
        pub monitor: bool,

        #[arg(long, help = "Emit logs as JSON lines")]
        pub json_logs: bool,
    }

    impl ConfigProvider for CliConfig {
        fn input_path(&self) -> &str {
            &self.input_path
        }

        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn rate_endpoint(&self) -> &str {
            &self.rate_endpoint
        }

        fn app_id(&self) -> Option<&str> {
            self.app_id.as_deref()
        }

        fn api_key(&self) -> Option<&str> {
            self.api_key.as_deref()
        }

        fn request_timeout(&self) -> Option<Duration> {
            self.timeout_seconds.map(Duration::from_secs)
        }

        fn processing_mode(&self) -> ProcessingMode {
            self.mode
        }

        fn report_shape(&self) -> ReportShape {
            self.shape
        }

        fn concurrent_requests(&self) -> usize {
            self.concurrent_requests
        }

        fn require_state_rate(&self) -> bool {
            self.require_state_rate
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validation::validate_input_file("input_path", &self.input_path)?;
            validation::validate_path("output_path", &self.output_path)?;
            validation::validate_url("rate_endpoint", &self.rate_endpoint)?;
            validation::validate_concurrency("concurrent_requests", self.concurrent_requests)?;
            if let Some(timeout) = self.timeout_seconds {
                validation::validate_positive_number("timeout_seconds", timeout as usize, 1)?;
            }
            if let Some(app_id) = &self.app_id {
                validation::validate_non_empty_string("app_id", app_id)?;
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::utils::error::EtlError;

        fn parse(args: &[&str]) -> CliConfig {
            let mut argv = vec![
                "sales-tax-etl",
                "--input-path",
                "clients.csv",
                "--rate-endpoint",
                "https://rates.example.com/lookup",
            ];
            argv.extend_from_slice(args);
            CliConfig::try_parse_from(argv).unwrap()
        }

        #[test]
        fn test_defaults() {
            let config = parse(&[]);
            assert_eq!(config.processing_mode(), ProcessingMode::Sequential);
            assert_eq!(config.report_shape(), ReportShape::Fixed);
            assert_eq!(config.concurrent_requests(), 10);
            assert_eq!(config.output_path(), "./output");
            assert!(config.request_timeout().is_none());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_mode_and_shape_flags() {
            let config = parse(&[
                "--mode",
                "parallel",
                "--shape",
                "dual",
                "--concurrent-requests",
                "25",
                "--timeout-seconds",
                "30",
            ]);
            assert_eq!(config.processing_mode(), ProcessingMode::Parallel);
            assert_eq!(config.report_shape(), ReportShape::Dual);
            assert_eq!(config.concurrent_requests(), 25);
            assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        }

        #[test]
        fn test_unknown_shape_is_rejected() {
            let result = CliConfig::try_parse_from([
                "sales-tax-etl",
                "--input-path",
                "clients.csv",
                "--rate-endpoint",
                "https://rates.example.com",
                "--shape",
                "pdf",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn test_validation_rejects_bad_values() {
            let mut config = parse(&[]);
            config.input_path = "clients.xlsx".to_string();
            assert!(config.validate().is_err());

            let mut config = parse(&[]);
            config.concurrent_requests = 0;
            assert!(matches!(
                config.validate(),
                Err(EtlError::InvalidConfigValueError { .. })
            ));

            let mut config = parse(&[]);
            config.rate_endpoint = "not a url".to_string();
            assert!(config.validate().is_err());
        }
    }
}
