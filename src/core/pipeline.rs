use crate::adapters::http::{RateServiceClient, RateServiceSettings};
use crate::core::orchestrator::Orchestrator;
use crate::core::parser::RowParser;
use crate::core::report::ReportWriter;
use crate::core::{ConfigProvider, Pipeline, RateLookup, Storage};
use crate::domain::model::{ParsedTable, ProcessingMode, ReportOutput, TransformResult};
use crate::utils::error::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

/// Charge sheet in, tax report out.
pub struct TaxPipeline<S: Storage, L: RateLookup + 'static> {
    storage: S,
    input_path: String,
    output_path: String,
    parser: RowParser,
    orchestrator: Orchestrator<L>,
    writer: ReportWriter,
    dispatch: Dispatch,
}

impl<S: Storage, L: RateLookup + 'static> TaxPipeline<S, L> {
    pub fn new<C: ConfigProvider>(storage: S, lookup: L, config: &C) -> Self {
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
        Self {
            storage,
            input_path: config.input_path().to_string(),
            output_path: config.output_path().to_string(),
            parser: RowParser::default(),
            orchestrator: Orchestrator::new(Arc::new(lookup))
                .with_mode(config.processing_mode())
                .with_max_in_flight(config.concurrent_requests())
                .with_dispatch(dispatch.clone()),
            writer: ReportWriter::new(config.report_shape()),
            dispatch,
        }
    }

    pub fn with_parser(mut self, parser: RowParser) -> Self {
        self.parser = parser;
        self
    }

    /// Routes all pipeline logging, spawned lookups included, to `dispatch`.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.orchestrator = self.orchestrator.with_dispatch(dispatch.clone());
        self.dispatch = dispatch;
        self
    }

    /// Entry point for front doors that hold the upload in memory.
    pub async fn process_bytes(&self, input: &[u8], stem: &str) -> Result<ReportOutput> {
        async {
            let table = self.parse(input)?;
            let result = self.orchestrator.run(table).await?;
            log_summary(&result);
            self.writer.render(&result, stem)
        }
        .with_subscriber(self.dispatch.clone())
        .await
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedTable> {
        match self.orchestrator.mode() {
            ProcessingMode::Sequential => self.parser.parse_records(input),
            ProcessingMode::Parallel => self.parser.parse_rows(input),
        }
    }

    fn input_stem(&self) -> String {
        Path::new(&self.input_path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or("report")
            .to_string()
    }
}

/// Pipeline backed by the HTTP rate service described in `config`.
pub fn build_pipeline<S: Storage, C: ConfigProvider>(
    storage: S,
    config: &C,
) -> Result<TaxPipeline<S, RateServiceClient>> {
    let client = RateServiceClient::new(RateServiceSettings::from_config(config))?;
    Ok(TaxPipeline::new(storage, client, config))
}

fn log_summary(result: &TransformResult) {
    let failed = result.failed_count();
    if failed > 0 {
        tracing::warn!(
            "Enriched {} rows, {} rows carry errors",
            result.enriched_count(),
            failed
        );
    } else {
        tracing::info!("Enriched {} rows", result.enriched_count());
    }
}

#[async_trait::async_trait]
impl<S: Storage, L: RateLookup + 'static> Pipeline for TaxPipeline<S, L> {
    async fn extract(&self) -> Result<ParsedTable> {
        async {
            tracing::debug!("Reading charges from {}", self.input_path);
            let input = self.storage.read_file(&self.input_path).await?;
            let table = self.parse(&input)?;
            tracing::info!("📥 Parsed {} rows ({:?} layout)", table.rows.len(), table.schema);
            Ok(table)
        }
        .with_subscriber(self.dispatch.clone())
        .await
    }

    async fn transform(&self, table: ParsedTable) -> Result<TransformResult> {
        async {
            let result = self.orchestrator.run(table).await?;
            log_summary(&result);
            Ok(result)
        }
        .with_subscriber(self.dispatch.clone())
        .await
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        async {
            let output = self.writer.render(&result, &self.input_stem())?;
            let path = Path::new(&self.output_path)
                .join(&output.filename)
                .to_string_lossy()
                .into_owned();

            tracing::debug!("Writing {} ({} bytes)", path, output.bytes.len());
            self.storage.write_file(&path, &output.bytes).await?;
            Ok(path)
        }
        .with_subscriber(self.dispatch.clone())
        .await
    }
}
