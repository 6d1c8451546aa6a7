// Adapters layer: concrete implementations for external systems.
// Local storage still lives under config::cli next to the CLI config.

pub mod http;

pub use http::{RateServiceClient, RateServiceSettings};
