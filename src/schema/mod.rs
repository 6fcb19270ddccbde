/// Feature schema for customer records
///
/// The field list and the category labels of every categorical field are
/// fixed here and versioned by [`SCHEMA_VERSION`]. Input arriving as JSON or
/// as CSV rows is validated into a typed [`CustomerRecord`]; anything missing,
/// mistyped or outside the category lists is a schema error.

pub mod parse;
pub mod record;

pub use parse::{parse_record, read_rows, record_from_json, FieldSource, RawRow, RawValue};
pub use record::{
    Contract, CustomerRecord, Field, FieldKind, FieldValue, Gender, InternetAddon,
    InternetService, PaymentMethod, PhoneLines, YesNo, SCHEMA_VERSION,
};
