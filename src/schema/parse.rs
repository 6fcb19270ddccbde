use crate::error::{AppError, Result};
use crate::schema::record::{CustomerRecord, Field};
use indexmap::IndexMap;
use std::str::FromStr;

/// Raw CSV row keyed by (trimmed) column header.
pub type RawRow = IndexMap<String, String>;

/// A raw, unvalidated value as it arrived on the wire.
#[derive(Debug, Clone, Copy)]
pub enum RawValue<'a> {
    Number(f64),
    Text(&'a str),
    /// Present but of an unusable JSON type (bool, array, object, null)
    Other(&'static str),
}

/// Anything a [`CustomerRecord`] can be read from.
pub trait FieldSource {
    fn raw(&self, name: &str) -> Option<RawValue<'_>>;
}

impl FieldSource for serde_json::Map<String, serde_json::Value> {
    fn raw(&self, name: &str) -> Option<RawValue<'_>> {
        use serde_json::Value;

        self.get(name).map(|value| match value {
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Other("number")),
            Value::String(s) => RawValue::Text(s),
            Value::Bool(_) => RawValue::Other("boolean"),
            Value::Null => RawValue::Other("null"),
            Value::Array(_) => RawValue::Other("array"),
            Value::Object(_) => RawValue::Other("object"),
        })
    }
}

impl FieldSource for RawRow {
    fn raw(&self, name: &str) -> Option<RawValue<'_>> {
        self.get(name).map(|s| RawValue::Text(s.as_str()))
    }
}

/// Validate a JSON request body into a record.
pub fn record_from_json(body: &serde_json::Value) -> Result<CustomerRecord> {
    match body.as_object() {
        Some(map) => parse_record(map),
        None => Err(AppError::Schema(
            "request body must be a JSON object of customer fields".to_string(),
        )),
    }
}

/// Read a CSV document into header-keyed rows.
///
/// Headers and cells are trimmed. A document without a header row or with
/// a repeated column name is a schema error; a header with no data rows
/// yields an empty vector.
pub fn read_rows<R: std::io::Read>(input: R) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(AppError::Schema("CSV file has no header row".to_string()));
    }
    let mut seen = std::collections::HashSet::new();
    if let Some(name) = headers.iter().find(|h| !h.is_empty() && !seen.insert(*h)) {
        return Err(AppError::Schema(format!("CSV header '{}' appears more than once", name)));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        );
    }
    Ok(rows)
}

/// Validate every required field of `source`.
///
/// Extra keys are ignored. Blank text counts as missing.
pub fn parse_record<S: FieldSource + ?Sized>(source: &S) -> Result<CustomerRecord> {
    Ok(CustomerRecord {
        gender: category(source, Field::Gender)?,
        senior_citizen: flag(source, Field::SeniorCitizen)?,
        partner: category(source, Field::Partner)?,
        dependents: category(source, Field::Dependents)?,
        tenure: whole_months(source, Field::Tenure)?,
        phone_service: category(source, Field::PhoneService)?,
        multiple_lines: category(source, Field::MultipleLines)?,
        internet_service: category(source, Field::InternetService)?,
        online_security: category(source, Field::OnlineSecurity)?,
        online_backup: category(source, Field::OnlineBackup)?,
        device_protection: category(source, Field::DeviceProtection)?,
        tech_support: category(source, Field::TechSupport)?,
        streaming_tv: category(source, Field::StreamingTv)?,
        streaming_movies: category(source, Field::StreamingMovies)?,
        contract: category(source, Field::Contract)?,
        paperless_billing: category(source, Field::PaperlessBilling)?,
        payment_method: category(source, Field::PaymentMethod)?,
        monthly_charges: amount(source, Field::MonthlyCharges)?,
        total_charges: amount(source, Field::TotalCharges)?,
    })
}

fn present<'a, S: FieldSource + ?Sized>(source: &'a S, field: Field) -> Result<RawValue<'a>> {
    match source.raw(field.as_ref()) {
        Some(RawValue::Text(s)) if s.trim().is_empty() => Err(missing(field)),
        Some(value) => Ok(value),
        None => Err(missing(field)),
    }
}

fn missing(field: Field) -> AppError {
    AppError::Schema(format!("missing required field '{}'", field))
}

fn category<T: FromStr, S: FieldSource + ?Sized>(source: &S, field: Field) -> Result<T> {
    match present(source, field)? {
        RawValue::Text(s) => T::from_str(s.trim()).map_err(|_| {
            AppError::Schema(format!(
                "unknown category '{}' for field '{}' (expected one of: {})",
                s.trim(),
                field,
                field.categories().join(", ")
            ))
        }),
        RawValue::Number(_) => Err(wrong_type(field, "number", "a category label")),
        RawValue::Other(kind) => Err(wrong_type(field, kind, "a category label")),
    }
}

fn number<S: FieldSource + ?Sized>(source: &S, field: Field) -> Result<f64> {
    let value = match present(source, field)? {
        RawValue::Number(n) => n,
        RawValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::Schema(format!("field '{}' must be numeric, got '{}'", field, s.trim())))?,
        RawValue::Other(kind) => return Err(wrong_type(field, kind, "a number")),
    };

    if !value.is_finite() {
        return Err(AppError::Schema(format!("field '{}' must be finite", field)));
    }
    if value < 0.0 {
        return Err(AppError::Schema(format!(
            "field '{}' must not be negative, got {}",
            field, value
        )));
    }
    Ok(value)
}

fn amount<S: FieldSource + ?Sized>(source: &S, field: Field) -> Result<f64> {
    number(source, field)
}

fn whole_months<S: FieldSource + ?Sized>(source: &S, field: Field) -> Result<u32> {
    let value = number(source, field)?;
    if value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(AppError::Schema(format!(
            "field '{}' must be a whole number of months, got {}",
            field, value
        )));
    }
    Ok(value as u32)
}

fn flag<S: FieldSource + ?Sized>(source: &S, field: Field) -> Result<u8> {
    match number(source, field)? {
        v if v == 0.0 => Ok(0),
        v if v == 1.0 => Ok(1),
        v => Err(AppError::Schema(format!(
            "field '{}' must be 0 or 1, got {}",
            field, v
        ))),
    }
}

fn wrong_type(field: Field, got: &str, expected: &str) -> AppError {
    AppError::Schema(format!(
        "field '{}' must be {}, got {}",
        field, expected, got
    ))
}
