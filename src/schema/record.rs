use serde::{Serialize, Serializer};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Version tag of the field and category lists below.
///
/// Pipeline artifacts carry the tag they were fitted against and are refused
/// at load time when it differs.
pub const SCHEMA_VERSION: &str = "telco-churn/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, IntoStaticStr, EnumIter)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, IntoStaticStr, EnumIter)]
pub enum YesNo {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, IntoStaticStr, EnumIter)]
pub enum PhoneLines {
    Yes,
    No,
    #[strum(serialize = "No phone service")]
    NoPhoneService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, IntoStaticStr, EnumIter)]
pub enum InternetService {
    #[strum(serialize = "DSL")]
    Dsl,
    #[strum(serialize = "Fiber optic")]
    FiberOptic,
    No,
}

/// Add-on services that only exist for customers with internet access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, IntoStaticStr, EnumIter)]
pub enum InternetAddon {
    Yes,
    No,
    #[strum(serialize = "No internet service")]
    NoInternetService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, IntoStaticStr, EnumIter)]
pub enum Contract {
    #[strum(serialize = "Month-to-month")]
    MonthToMonth,
    #[strum(serialize = "One year")]
    OneYear,
    #[strum(serialize = "Two year")]
    TwoYear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, IntoStaticStr, EnumIter)]
pub enum PaymentMethod {
    #[strum(serialize = "Electronic check")]
    ElectronicCheck,
    #[strum(serialize = "Mailed check")]
    MailedCheck,
    #[strum(serialize = "Bank transfer (automatic)")]
    BankTransfer,
    #[strum(serialize = "Credit card (automatic)")]
    CreditCard,
}

/// Every input field the pipeline consumes, in dataset column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display, AsRefStr, IntoStaticStr, EnumIter)]
pub enum Field {
    #[strum(serialize = "gender")]
    Gender,
    SeniorCitizen,
    Partner,
    Dependents,
    #[strum(serialize = "tenure")]
    Tenure,
    PhoneService,
    MultipleLines,
    InternetService,
    OnlineSecurity,
    OnlineBackup,
    DeviceProtection,
    TechSupport,
    #[strum(serialize = "StreamingTV")]
    StreamingTv,
    StreamingMovies,
    Contract,
    PaperlessBilling,
    PaymentMethod,
    MonthlyCharges,
    TotalCharges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Categorical,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::SeniorCitizen | Field::Tenure | Field::MonthlyCharges | Field::TotalCharges => {
                FieldKind::Numeric
            }
            _ => FieldKind::Categorical,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind() == FieldKind::Numeric
    }

    /// Accepted category labels; empty for numeric fields.
    pub fn categories(&self) -> Vec<&'static str> {
        fn labels<E: IntoEnumIterator + Into<&'static str>>() -> Vec<&'static str> {
            E::iter().map(Into::into).collect()
        }

        match self {
            Field::Gender => labels::<Gender>(),
            Field::Partner | Field::Dependents | Field::PhoneService | Field::PaperlessBilling => {
                labels::<YesNo>()
            }
            Field::MultipleLines => labels::<PhoneLines>(),
            Field::InternetService => labels::<InternetService>(),
            Field::OnlineSecurity
            | Field::OnlineBackup
            | Field::DeviceProtection
            | Field::TechSupport
            | Field::StreamingTv
            | Field::StreamingMovies => labels::<InternetAddon>(),
            Field::Contract => labels::<Contract>(),
            Field::PaymentMethod => labels::<PaymentMethod>(),
            Field::SeniorCitizen | Field::Tenure | Field::MonthlyCharges | Field::TotalCharges => {
                Vec::new()
            }
        }
    }

    pub fn numeric_fields() -> impl Iterator<Item = Field> {
        Field::iter().filter(Field::is_numeric)
    }

    pub fn categorical_fields() -> impl Iterator<Item = Field> {
        Field::iter().filter(|f| !f.is_numeric())
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_ref())
    }
}

impl<'de> serde::Deserialize<'de> for Field {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Field::from_str(&name)
            .map_err(|_| serde::de::Error::custom(format!("unknown field '{}'", name)))
    }
}

/// A single value read off a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Numeric(f64),
    Category(&'static str),
}

/// A fully validated customer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub gender: Gender,
    pub senior_citizen: u8,
    pub partner: YesNo,
    pub dependents: YesNo,
    pub tenure: u32,
    pub phone_service: YesNo,
    pub multiple_lines: PhoneLines,
    pub internet_service: InternetService,
    pub online_security: InternetAddon,
    pub online_backup: InternetAddon,
    pub device_protection: InternetAddon,
    pub tech_support: InternetAddon,
    pub streaming_tv: InternetAddon,
    pub streaming_movies: InternetAddon,
    pub contract: Contract,
    pub paperless_billing: YesNo,
    pub payment_method: PaymentMethod,
    pub monthly_charges: f64,
    pub total_charges: f64,
}

impl CustomerRecord {
    pub fn value(&self, field: Field) -> FieldValue {
        match field {
            Field::Gender => FieldValue::Category(self.gender.into()),
            Field::SeniorCitizen => FieldValue::Numeric(f64::from(self.senior_citizen)),
            Field::Partner => FieldValue::Category(self.partner.into()),
            Field::Dependents => FieldValue::Category(self.dependents.into()),
            Field::Tenure => FieldValue::Numeric(f64::from(self.tenure)),
            Field::PhoneService => FieldValue::Category(self.phone_service.into()),
            Field::MultipleLines => FieldValue::Category(self.multiple_lines.into()),
            Field::InternetService => FieldValue::Category(self.internet_service.into()),
            Field::OnlineSecurity => FieldValue::Category(self.online_security.into()),
            Field::OnlineBackup => FieldValue::Category(self.online_backup.into()),
            Field::DeviceProtection => FieldValue::Category(self.device_protection.into()),
            Field::TechSupport => FieldValue::Category(self.tech_support.into()),
            Field::StreamingTv => FieldValue::Category(self.streaming_tv.into()),
            Field::StreamingMovies => FieldValue::Category(self.streaming_movies.into()),
            Field::Contract => FieldValue::Category(self.contract.into()),
            Field::PaperlessBilling => FieldValue::Category(self.paperless_billing.into()),
            Field::PaymentMethod => FieldValue::Category(self.payment_method.into()),
            Field::MonthlyCharges => FieldValue::Numeric(self.monthly_charges),
            Field::TotalCharges => FieldValue::Numeric(self.total_charges),
        }
    }

    /// Numeric value of `field`; categorical fields read as NaN.
    pub fn numeric(&self, field: Field) -> f64 {
        match self.value(field) {
            FieldValue::Numeric(v) => v,
            FieldValue::Category(_) => f64::NAN,
        }
    }

    /// Category label of `field`; numeric fields read as `None`.
    pub fn category(&self, field: Field) -> Option<&'static str> {
        match self.value(field) {
            FieldValue::Category(label) => Some(label),
            FieldValue::Numeric(_) => None,
        }
    }
}

/// Serializes with the dataset's column names, in column order.
impl Serialize for CustomerRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(Field::iter().len()))?;
        for field in Field::iter() {
            match field {
                Field::Tenure => map.serialize_entry(field.as_ref(), &self.tenure)?,
                Field::SeniorCitizen => map.serialize_entry(field.as_ref(), &self.senior_citizen)?,
                _ => match self.value(field) {
                    FieldValue::Numeric(v) => map.serialize_entry(field.as_ref(), &v)?,
                    FieldValue::Category(label) => map.serialize_entry(field.as_ref(), label)?,
                },
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_match_dataset_spelling() {
        assert_eq!(Contract::MonthToMonth.to_string(), "Month-to-month");
        assert_eq!(InternetService::FiberOptic.to_string(), "Fiber optic");
        assert_eq!(
            PaymentMethod::from_str("Bank transfer (automatic)").unwrap(),
            PaymentMethod::BankTransfer
        );
        assert!(Contract::from_str("month-to-month").is_err());
    }

    #[test]
    fn test_field_names_and_kinds() {
        assert_eq!(Field::iter().count(), 19);
        assert_eq!(Field::numeric_fields().count(), 4);
        assert_eq!(Field::StreamingTv.as_ref(), "StreamingTV");
        assert_eq!(Field::from_str("tenure").unwrap(), Field::Tenure);
        assert!(Field::Tenure.categories().is_empty());
        assert_eq!(
            Field::MultipleLines.categories(),
            vec!["Yes", "No", "No phone service"]
        );
    }
}
