use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::str::FromStr;

pub type Id = i64;

/// A monetary value as it arrived from the wire.
///
/// Amounts are parsed into an exact `Decimal` at deserialization time. Values that
/// do not parse (non-numeric strings, booleans, objects) are kept verbatim as
/// `Invalid` so consumers can surface them instead of counting them as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    Valid(Decimal),
    Invalid(String),
}

impl Amount {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match Decimal::from_str(trimmed).or_else(|_| Decimal::from_scientific(trimmed)) {
            Ok(value) => Self::Valid(value),
            Err(_) => Self::Invalid(raw.to_string()),
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Self::Valid(value) => Some(*value),
            Self::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Display text for consumers: the normalized decimal, or `Invalid`.
    pub fn display(&self) -> String {
        match self {
            Self::Valid(value) => value.normalize().to_string(),
            Self::Invalid(_) => "Invalid".to_string(),
        }
    }
}

/// An absent amount is not zero: it is reported like `null`.
impl Default for Amount {
    fn default() -> Self {
        Self::Invalid(String::new())
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self::Valid(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid(value) => serializer.serialize_str(&value.to_string()),
            Self::Invalid(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            // serde_json renders the shortest round-trip text, which parses exactly.
            Value::Number(n) => Amount::parse(&n.to_string()),
            Value::String(s) => Amount::parse(&s),
            Value::Null => Amount::Invalid(String::new()),
            other => Amount::Invalid(other.to_string()),
        })
    }
}

/// Parses the timestamp formats the backend is known to emit.
pub fn parse_wire_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: Id,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Id,
    #[serde(default)]
    pub amount: Amount,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub source_id: Option<Id>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        self.date.as_deref().and_then(parse_wire_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Id,
    #[serde(default)]
    pub category_id: Option<Id>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub budget_amount: Amount,
    #[serde(default)]
    pub target_period: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Budget {
    pub fn target_date(&self) -> Option<NaiveDate> {
        self.target_period
            .as_deref()
            .and_then(parse_wire_date)
            .map(|dt| dt.date_naive())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: Id,
    pub institution_id: Value,
    #[serde(default)]
    pub consent_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedExpense {
    pub id: Id,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Aggregate funds object as returned by `/api/balances`. Only `total` is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default)]
    pub total: Option<Amount>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInput {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub category_id: Option<Id>,
    #[serde(default)]
    pub source_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetInput {
    pub category_id: Id,
    #[serde(with = "rust_decimal::serde::float")]
    pub budget_amount: Decimal,
    pub target_period: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInput {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyError {
    pub code: String,
    pub message: String,
}

/// Serializable result envelope handed to consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply<T> {
    Ok { ok: bool, value: T },
    Err { ok: bool, error: ReplyError },
}

impl<T> Reply<T> {
    pub fn ok(value: T) -> Self {
        Self::Ok { ok: true, value }
    }

    pub fn err(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Err {
            ok: false,
            error: ReplyError {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

impl<T> From<crate::error::ActionResult<T>> for Reply<T> {
    fn from(value: crate::error::ActionResult<T>) -> Self {
        match value {
            Ok(value) => Self::ok(value),
            Err(err) => Self::err(err.code(), err.user_message()),
        }
    }
}
