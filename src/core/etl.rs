use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Runs extract, transform and load once, returning where the report landed.
    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting sales tax run");

        // Extract
        let table = self.pipeline.extract().await?;
        let total = table.rows.len();
        self.monitor.log_stats("Extract", total);

        // Transform
        let result = self.pipeline.transform(table).await?;
        tracing::info!(
            "Transformed {} rows ({} enriched, {} failed)",
            result.outcomes.len(),
            result.enriched_count(),
            result.failed_count()
        );
        self.monitor.log_stats("Transform", result.outcomes.len());

        // Load
        let output_path = self.pipeline.load(result).await?;
        self.monitor.log_stats("Load", total);
        self.monitor.log_final_stats();

        tracing::info!("Report saved to: {}", output_path);
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        InputRow, InputSchema, ParsedTable, RowOutcome, TransformResult,
    };
    use crate::utils::error::EtlError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPipeline {
        phases: Mutex<Vec<&'static str>>,
        fail_transform: bool,
    }

    #[async_trait]
    impl Pipeline for RecordingPipeline {
        async fn extract(&self) -> Result<ParsedTable> {
            self.phases.lock().unwrap().push("extract");
            Ok(ParsedTable {
                schema: InputSchema::Undated,
                rows: Vec::new(),
            })
        }

        async fn transform(&self, table: ParsedTable) -> Result<TransformResult> {
            self.phases.lock().unwrap().push("transform");
            if self.fail_transform {
                return Err(EtlError::ProcessingError {
                    message: "lookup worker crashed".to_string(),
                });
            }
            Ok(TransformResult {
                schema: table.schema,
                outcomes: vec![RowOutcome::Failed {
                    row: InputRow {
                        position: 1,
                        fields: vec!["A".to_string()],
                    },
                    record: None,
                    error: "Row 1 has 1 fields, expected 6".to_string(),
                }],
            })
        }

        async fn load(&self, result: TransformResult) -> Result<String> {
            self.phases.lock().unwrap().push("load");
            assert_eq!(result.failed_count(), 1);
            Ok("out/report_taxes.csv".to_string())
        }
    }

    #[tokio::test]
    async fn test_run_executes_phases_in_order() {
        let engine = EtlEngine::new(RecordingPipeline::default());

        let path = engine.run().await.unwrap();
        assert_eq!(path, "out/report_taxes.csv");
        assert_eq!(
            *engine.pipeline().phases.lock().unwrap(),
            vec!["extract", "transform", "load"]
        );
    }

    #[tokio::test]
    async fn test_run_stops_at_failing_phase() {
        let engine = EtlEngine::new_with_monitoring(
            RecordingPipeline {
                fail_transform: true,
                ..Default::default()
            },
            false,
        );

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, EtlError::ProcessingError { .. }));
        assert_eq!(
            *engine.pipeline().phases.lock().unwrap(),
            vec!["extract", "transform"]
        );
    }
}
