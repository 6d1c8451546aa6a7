use crate::domain::model::{
    Address, ParsedTable, ProcessingMode, RateTable, ReportShape, TaxPeriod, TransformResult,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn rate_endpoint(&self) -> &str;
    fn app_id(&self) -> Option<&str>;
    fn api_key(&self) -> Option<&str>;
    fn request_timeout(&self) -> Option<Duration>;
    fn processing_mode(&self) -> ProcessingMode;
    fn report_shape(&self) -> ReportShape;
    fn concurrent_requests(&self) -> usize;
    fn require_state_rate(&self) -> bool;
}

/// Resolves the jurisdiction rates that apply to an address in a period.
#[async_trait]
pub trait RateLookup: Send + Sync {
    async fn lookup(&self, address: &Address, period: TaxPeriod) -> Result<RateTable>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ParsedTable>;
    async fn transform(&self, table: ParsedTable) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
