use crate::domain::model::{
    Address, JurisdictionKind, JurisdictionRate, RateTable, ReportShape, TaxPeriod,
};
use crate::domain::ports::{ConfigProvider, RateLookup};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const APP_ID_HEADER: &str = "x-app-id";
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct RateServiceSettings {
    pub endpoint: String,
    pub app_id: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
    /// Fail lookups that resolve no positive state rate.
    pub require_state_rate: bool,
}

impl RateServiceSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            app_id: None,
            api_key: None,
            timeout: None,
            require_state_rate: false,
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            endpoint: config.rate_endpoint().to_string(),
            app_id: config.app_id().map(str::to_string),
            api_key: config.api_key().map(str::to_string),
            timeout: config.request_timeout(),
            require_state_rate: config.require_state_rate()
                || config.report_shape() == ReportShape::Fixed,
        }
    }

    pub fn with_credentials(mut self, app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_required_state_rate(mut self, required: bool) -> Self {
        self.require_state_rate = required;
        self
    }
}

/// Entries stay as raw JSON so one malformed jurisdiction cannot sink the lookup.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateResponse {
    #[serde(default)]
    return_code: Value,
    #[serde(default)]
    street: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    zip: Option<String>,
    #[serde(default)]
    jurisdictions: Vec<Value>,
}

impl RateResponse {
    /// `None` when the code is present but not an integer.
    fn return_code(&self) -> Option<i64> {
        match &self.return_code {
            Value::Null => Some(0),
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RateEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    rate: Value,
}

/// Outcome of converting one jurisdiction entry from the service.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRate {
    Valid(JurisdictionRate),
    Skipped { name: String, reason: String },
}

const UNNAMED: &str = "<unnamed>";

impl ParsedRate {
    fn from_json(raw: Value) -> Self {
        match serde_json::from_value::<RateEntry>(raw) {
            Ok(entry) => entry.parse(),
            Err(e) => ParsedRate::Skipped {
                name: UNNAMED.to_string(),
                reason: format!("malformed entry: {}", e),
            },
        }
    }
}

impl RateEntry {
    fn parse(self) -> ParsedRate {
        let name = match self.name.map(|name| name.trim().to_string()) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return ParsedRate::Skipped {
                    name: UNNAMED.to_string(),
                    reason: "entry has no name".to_string(),
                }
            }
        };

        let parsed = match &self.rate {
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("rate '{}' is not a number", text)),
            Value::Number(number) => number
                .as_f64()
                .ok_or_else(|| format!("rate {} is out of range", number)),
            Value::Null => Err("rate is missing".to_string()),
            other => Err(format!("rate {} has an unexpected type", other)),
        };

        match parsed {
            Ok(rate) if rate.is_finite() && rate >= 0.0 => ParsedRate::Valid(JurisdictionRate {
                kind: JurisdictionKind::from_tag(&self.kind),
                name,
                rate,
            }),
            Ok(rate) => ParsedRate::Skipped {
                name,
                reason: format!("rate {} is not a usable fraction", rate),
            },
            Err(reason) => ParsedRate::Skipped { name, reason },
        }
    }
}

/// HTTP client for the government rate-lookup service.
pub struct RateServiceClient {
    client: Client,
    settings: RateServiceSettings,
}

impl RateServiceClient {
    pub fn new(settings: RateServiceSettings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            settings,
        })
    }

    fn rate_table(&self, address: &Address, response: RateResponse) -> Result<RateTable> {
        let mut table = RateTable::new();
        for entry in response.jurisdictions {
            match ParsedRate::from_json(entry) {
                ParsedRate::Valid(rate) => {
                    let name = rate.name.clone();
                    if !table.insert(rate) {
                        tracing::warn!(
                            "Duplicate jurisdiction '{}' for {}, keeping the first rate",
                            name,
                            address
                        );
                    }
                }
                ParsedRate::Skipped { name, reason } => {
                    tracing::warn!("Skipping rate for '{}' at {}: {}", name, address, reason);
                }
            }
        }

        if table.is_empty() {
            return Err(EtlError::NoRatesFoundError {
                address: address.to_string(),
                reason: "the service returned no usable rates".to_string(),
            });
        }

        if self.settings.require_state_rate
            && table.rate_for_kind(&JurisdictionKind::State) <= 0.0
        {
            return Err(EtlError::NoRatesFoundError {
                address: address.to_string(),
                reason: "state rate is missing or zero".to_string(),
            });
        }

        Ok(table)
    }
}

fn check_echoed_address(requested: &Address, response: &RateResponse) {
    let differs = |echoed: &Option<String>, sent: &str, ignore_case: bool| match echoed {
        Some(echoed) if ignore_case => echoed.trim().to_lowercase() != sent.to_lowercase(),
        Some(echoed) => echoed.trim() != sent,
        None => false,
    };

    if differs(&response.street, &requested.street, true)
        || differs(&response.city, &requested.city, true)
        || differs(&response.zip, &requested.zip, false)
    {
        tracing::warn!(
            "Rate service matched a different address for {}: street={:?} city={:?} zip={:?}",
            requested,
            response.street,
            response.city,
            response.zip
        );
    }
}

#[async_trait]
impl RateLookup for RateServiceClient {
    async fn lookup(&self, address: &Address, period: TaxPeriod) -> Result<RateTable> {
        let quarter = period.quarter.to_string();
        let year = period.year.to_string();

        let mut request = self.client.get(&self.settings.endpoint).query(&[
            ("street", address.street.as_str()),
            ("city", address.city.as_str()),
            ("zipcode", address.zip.as_str()),
            ("state", address.state.as_str()),
            ("quarter", quarter.as_str()),
            ("year", year.as_str()),
        ]);
        if let Some(app_id) = &self.settings.app_id {
            request = request.header(APP_ID_HEADER, app_id);
        }
        if let Some(api_key) = &self.settings.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        tracing::debug!("Looking up Q{} {} rates for {}", quarter, year, address);
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Rate service response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::LookupHttpError {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: RateResponse =
            serde_json::from_str(&body).map_err(|e| EtlError::LookupParseError {
                message: e.to_string(),
            })?;

        match parsed.return_code() {
            Some(0) => {}
            Some(code) => tracing::warn!("Rate service returned code {} for {}", code, address),
            None => tracing::warn!(
                "Rate service returned an unreadable code {} for {}",
                parsed.return_code,
                address
            ),
        }
        check_echoed_address(address, &parsed);

        self.rate_table(address, parsed)
    }
}
