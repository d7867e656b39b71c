use crate::errors::UnderwritingError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A JSON object record, the serialized form of a domain object.
pub type Record = Map<String, Value>;

/// Explicit serialization of a domain object into a JSON object record.
pub trait ToRecord {
    fn to_record(&self) -> Result<Record, UnderwritingError>;
}

/// Serializes `value` and requires the result to be a JSON object.
fn serialize_record<T: Serialize>(kind: &str, value: &T) -> Result<Record, UnderwritingError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(UnderwritingError::Serialization(format!(
            "{} did not serialize to a JSON object (got {})",
            kind,
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============ Rating Request ============

/// A request to rate a commercial BOP policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRequest {
    /// Version identifier of the rating request schema.
    pub version: String,
    pub quote: Quote,
    #[serde(rename = "commercialBOPPolicy")]
    pub commercial_bop_policy: CommercialBopPolicy,
}

/// The quote being rated, carried as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(flatten)]
    pub details: Record,
}

impl Quote {
    /// The `quoteId` field, when present as a string or a number.
    pub fn quote_id(&self) -> Option<String> {
        match self.details.get("quoteId")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialBopPolicy {
    /// Date the policy takes effect (serialized as `YYYY-MM-DD`).
    pub effective_date: NaiveDate,
    pub insured_address: Address,
    /// Business name of the insured.
    pub insured_name: String,
    /// Insured locations in the order they were submitted.
    #[serde(default)]
    pub insured_locations: Vec<InsuredLocation>,
}

/// Postal address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    /// Any other address fields (country, coordinates, ...).
    #[serde(flatten)]
    pub extra: Record,
}

/// An insured location with its prefill attributes.
///
/// The address, classifications, parcel id and vendor payload have fixed
/// keys. Every other prefill output (building area, year built, ...) lands in
/// `attributes` and is serialized at the top level of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuredLocation {
    #[serde(
        rename = "locationAddress",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub location_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<Value>,
    /// FIPS county code + assessor parcel number.
    #[serde(rename = "fipsApn", default, skip_serializing_if = "Option::is_none")]
    pub fips_apn: Option<String>,
    #[serde(
        rename = "ExternalVendorData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub external_vendor_data: Option<Value>,
    #[serde(flatten)]
    pub attributes: Record,
}

impl ToRecord for Quote {
    fn to_record(&self) -> Result<Record, UnderwritingError> {
        serialize_record("quote", self)
    }
}

impl ToRecord for Address {
    fn to_record(&self) -> Result<Record, UnderwritingError> {
        serialize_record("address", self)
    }
}

impl ToRecord for InsuredLocation {
    fn to_record(&self) -> Result<Record, UnderwritingError> {
        serialize_record("insured location", self)
    }
}

// ============ Tenant ============

/// The tenant (customer) charged for external calls.
///
/// Each tenant maps to the certificate presented in the cert header for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tenant {
    #[default]
    Attune,
    Blackboard,
}

impl Tenant {
    pub fn cert(&self) -> &'static str {
        match self {
            Tenant::Attune => "hamilton-guidewireprod-9999",
            Tenant::Blackboard => "twosigma-9999",
        }
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tenant::Attune => f.write_str("ATTUNE"),
            Tenant::Blackboard => f.write_str("BLACKBOARD"),
        }
    }
}

impl FromStr for Tenant {
    type Err = UnderwritingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ATTUNE" => Ok(Tenant::Attune),
            "BLACKBOARD" => Ok(Tenant::Blackboard),
            other => Err(UnderwritingError::InvalidInput(format!(
                "unknown tenant '{}'",
                other
            ))),
        }
    }
}

// ============ Underwriting Payloads ============

/// Location keys never forwarded as underwriting data.
pub const EXCLUDED_LOCATION_KEYS: [&str; 4] = [
    "ExternalVendorData",
    "locationAddress",
    "classifications",
    "fipsApn",
];

/// Prefill values forwarded to the underwriting engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnderwritingData(Record);

impl UnderwritingData {
    /// Keeps every field of a location record except the excluded keys.
    pub fn from_location_record(record: Record) -> Self {
        Self(
            record
                .into_iter()
                .filter(|(key, _)| !EXCLUDED_LOCATION_KEYS.contains(&key.as_str()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_record(&self) -> &Record {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub name: String,
}

/// The insured entity as the underwriting engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingEntity {
    pub address: Record,
    pub business: Business,
}

/// Payload posted to the `uw` endpoint. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderwritingRequest {
    version: String,
    request_id: Uuid,
    quote: Record,
    effective_date: NaiveDate,
    entity: UnderwritingEntity,
    underwriting_data: UnderwritingData,
}

impl UnderwritingRequest {
    pub(crate) fn new(
        version: String,
        quote: Record,
        effective_date: NaiveDate,
        entity: UnderwritingEntity,
        underwriting_data: UnderwritingData,
    ) -> Self {
        Self {
            version,
            request_id: Uuid::new_v4(),
            quote,
            effective_date,
            entity,
            underwriting_data,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn quote(&self) -> &Record {
        &self.quote
    }

    pub fn effective_date(&self) -> NaiveDate {
        self.effective_date
    }

    pub fn entity(&self) -> &UnderwritingEntity {
        &self.entity
    }

    pub fn underwriting_data(&self) -> &UnderwritingData {
        &self.underwriting_data
    }
}

/// Audit record pairing an underwriting request with the engine's answer.
///
/// Only produced for successful (HTTP 200) calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingLogLine {
    pub request: UnderwritingRequest,
    pub response: Value,
}

impl UnderwritingLogLine {
    pub fn new(request: UnderwritingRequest, response: Value) -> Self {
        Self { request, response }
    }

    /// Renders the log line as a single line of JSON.
    pub fn to_json_line(&self) -> Result<String, UnderwritingError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a log line previously written with `to_json_line`.
    pub fn from_json_line(line: &str) -> Result<Self, UnderwritingError> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}
