pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{RateServiceClient, RateServiceSettings};
pub use config::cli::LocalStorage;
pub use config::toml_config::TomlConfig;
#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use core::{
    etl::EtlEngine,
    pipeline::{build_pipeline, TaxPipeline},
};
pub use domain::model::{ProcessingMode, ReportOutput, ReportShape};
pub use utils::error::{EtlError, Result};
