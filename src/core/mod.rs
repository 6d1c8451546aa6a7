pub mod calculator;
pub mod etl;
pub mod orchestrator;
pub mod parser;
pub mod pipeline;
pub mod report;

pub use crate::domain::model::{ParsedTable, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, RateLookup, Storage};
pub use crate::utils::error::Result;
