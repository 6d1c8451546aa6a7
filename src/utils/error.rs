use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Unexpected CSV header: expected [{expected}], received [{received}]")]
    SchemaError { expected: String, received: String },

    #[error("Row {row} has {found} fields, expected {expected}")]
    RowShapeError {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid date '{value}' for client {client}: {reason}")]
    DateFormatError {
        client: String,
        value: String,
        reason: String,
    },

    #[error("Invalid charge '{value}' for client {client}")]
    ChargeFormatError { client: String, value: String },

    #[error("Rate service returned HTTP {status}: {body}")]
    LookupHttpError { status: u16, body: String },

    #[error("Failed to parse rate service response: {message}")]
    LookupParseError { message: String },

    #[error("No tax rates found for {address}: {reason}")]
    NoRatesFoundError { address: String, reason: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    RateService,
    Output,
    Configuration,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit status for a run that ended with this severity.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::SchemaError { .. }
            | EtlError::RowShapeError { .. }
            | EtlError::DateFormatError { .. }
            | EtlError::ChargeFormatError { .. }
            | EtlError::CsvError(_) => ErrorCategory::Input,
            EtlError::LookupHttpError { .. }
            | EtlError::LookupParseError { .. }
            | EtlError::NoRatesFoundError { .. }
            | EtlError::ApiError(_) => ErrorCategory::RateService,
            EtlError::ZipError(_) | EtlError::IoError(_) | EtlError::SerializationError(_) => {
                ErrorCategory::Output
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    /// Rate-service failures are worth retrying later; bad input is not.
    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::RateService => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Output | ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::SchemaError { .. } => {
                "Make the header row match one of the supported layouts exactly, including column order"
            }
            EtlError::RowShapeError { .. } => "Check the row for missing or extra commas",
            EtlError::DateFormatError { .. } => "Use MM/DD/YYYY dates with a year of 2000 or later",
            EtlError::ChargeFormatError { .. } => {
                "Charges must be plain non-negative numbers such as 100.00"
            }
            EtlError::LookupHttpError { .. } | EtlError::ApiError(_) => {
                "Check the rate service endpoint and credentials, then retry"
            }
            EtlError::LookupParseError { .. } => {
                "The rate service answered with an unexpected body; verify the endpoint"
            }
            EtlError::NoRatesFoundError { .. } => "Verify the address is complete and taxable",
            EtlError::CsvError(_) => "Make sure the upload is a valid comma-separated file",
            EtlError::ZipError(_) | EtlError::IoError(_) | EtlError::SerializationError(_) => {
                "Check that the output location is writable"
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Review the configuration values",
            EtlError::ProcessingError { .. } => "Re-run with --verbose for more detail",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Input file rejected: {}", self),
            ErrorCategory::RateService => format!("Tax rate lookup failed: {}", self),
            ErrorCategory::Output => format!("Could not write the report: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Processing => format!("Processing failed: {}", self),
        }
    }
}
