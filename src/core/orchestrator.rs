use crate::core::calculator;
use crate::domain::model::{
    ChargeRecord, EnrichedRecord, InputRow, ParsedRow, ParsedTable, ProcessingMode, RowOutcome,
    TransformResult,
};
use crate::domain::ports::RateLookup;
use crate::utils::error::{EtlError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Drives lookup and tax calculation for every parsed row.
pub struct Orchestrator<L: RateLookup + 'static> {
    lookup: Arc<L>,
    mode: ProcessingMode,
    max_in_flight: usize,
    dispatch: Dispatch,
}

impl<L: RateLookup + 'static> Orchestrator<L> {
    /// Starts sequential, logging to whatever dispatcher is current.
    pub fn new(lookup: Arc<L>) -> Self {
        Self {
            lookup,
            mode: ProcessingMode::Sequential,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub async fn run(&self, table: ParsedTable) -> Result<TransformResult> {
        let schema = table.schema;
        let outcomes = match self.mode {
            ProcessingMode::Sequential => self
                .run_sequential(table.rows)
                .await?
                .into_iter()
                .map(RowOutcome::Enriched)
                .collect(),
            ProcessingMode::Parallel => self.run_parallel(table.rows).await?,
        };
        Ok(TransformResult { schema, outcomes })
    }

    /// Input order, one lookup at a time; the first failing row aborts.
    pub async fn run_sequential(&self, rows: Vec<ParsedRow>) -> Result<Vec<EnrichedRecord>> {
        self.enrich_sequential(rows)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    /// At most `max_in_flight` concurrent lookups. Failures are kept per row and
    /// results come back in input order.
    pub async fn run_parallel(&self, rows: Vec<ParsedRow>) -> Result<Vec<RowOutcome>> {
        self.enrich_parallel(rows)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    async fn enrich_sequential(&self, rows: Vec<ParsedRow>) -> Result<Vec<EnrichedRecord>> {
        tracing::info!("Enriching {} rows sequentially", rows.len());
        let mut enriched = Vec::with_capacity(rows.len());

        for ParsedRow { row, record } in rows {
            let record = record?;
            let rates = match self.lookup.lookup(&record.address, record.period).await {
                Ok(rates) => rates,
                Err(e) => {
                    tracing::error!(
                        "Row {} ({}) failed, aborting run: {}",
                        row.position,
                        record.client,
                        e
                    );
                    return Err(e);
                }
            };
            let taxes = calculator::amounts(record.charge, &rates);
            enriched.push(EnrichedRecord { row, record, taxes });
        }

        Ok(enriched)
    }

    async fn enrich_parallel(&self, rows: Vec<ParsedRow>) -> Result<Vec<RowOutcome>> {
        tracing::info!(
            "Enriching {} rows with up to {} concurrent lookups",
            rows.len(),
            self.max_in_flight
        );

        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut slots: Vec<Option<RowOutcome>> = vec![None; rows.len()];
        let mut tasks = JoinSet::new();

        for (index, ParsedRow { row, record }) in rows.into_iter().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Row {} rejected: {}", row.position, e);
                    slots[index] = Some(RowOutcome::Failed {
                        row,
                        record: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| EtlError::ProcessingError {
                    message: format!("lookup limiter closed: {}", e),
                })?;
            let lookup = Arc::clone(&self.lookup);
            tasks.spawn(
                async move {
                    let outcome = enrich_one(lookup.as_ref(), row, record).await;
                    drop(permit);
                    (index, outcome)
                }
                .with_subscriber(self.dispatch.clone()),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = joined.map_err(|e| EtlError::ProcessingError {
                message: format!("lookup task failed: {}", e),
            })?;
            slots[index] = Some(outcome);
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| EtlError::ProcessingError {
                message: "a row finished without an outcome".to_string(),
            })
    }
}

async fn enrich_one<L: RateLookup + ?Sized>(
    lookup: &L,
    row: InputRow,
    record: ChargeRecord,
) -> RowOutcome {
    match lookup.lookup(&record.address, record.period).await {
        Ok(rates) => RowOutcome::Enriched(EnrichedRecord {
            taxes: calculator::amounts(record.charge, &rates),
            row,
            record,
        }),
        Err(e) => {
            tracing::warn!("Row {} ({}) failed: {}", row.position, record.client, e);
            RowOutcome::Failed {
                row,
                record: Some(record),
                error: e.to_string(),
            }
        }
    }
}
