//! Dimension table shaping

use crate::error::PipelineResult;
use crate::table::{Table, Value};

/// ISO 4217 codes the warehouse knows a display name for
pub const CURRENCY_NAMES: [(&str, &str); 20] = [
    ("USD", "US Dollar"),
    ("EUR", "Euro"),
    ("GBP", "British Pound"),
    ("JPY", "Japanese Yen"),
    ("AUD", "Australian Dollar"),
    ("CAD", "Canadian Dollar"),
    ("CHF", "Swiss Franc"),
    ("CNY", "Chinese Yuan"),
    ("NZD", "New Zealand Dollar"),
    ("SEK", "Swedish Krona"),
    ("NOK", "Norwegian Krone"),
    ("MXN", "Mexican Peso"),
    ("INR", "Indian Rupee"),
    ("BRL", "Brazilian Real"),
    ("ZAR", "South African Rand"),
    ("SGD", "Singapore Dollar"),
    ("HKD", "Hong Kong Dollar"),
    ("KRW", "South Korean Won"),
    ("RUB", "Russian Ruble"),
    ("TRY", "Turkish Lira"),
];

const ADDRESS_FIELDS: [&str; 7] = [
    "address_line_1",
    "address_line_2",
    "district",
    "city",
    "postal_code",
    "country",
    "phone",
];

const COUNTERPARTY_ADDRESS_RENAMES: [(&str, &str); 7] = [
    ("address_line_1", "counterparty_legal_address_line_1"),
    ("address_line_2", "counterparty_legal_address_line_2"),
    ("district", "counterparty_legal_district"),
    ("city", "counterparty_legal_city"),
    ("postal_code", "counterparty_legal_postal_code"),
    ("country", "counterparty_legal_country"),
    ("phone", "counterparty_legal_phone_number"),
];

pub const DIM_COUNTERPARTY_COLUMNS: [&str; 9] = [
    "counterparty_id",
    "counterparty_legal_name",
    "counterparty_legal_address_line_1",
    "counterparty_legal_address_line_2",
    "counterparty_legal_district",
    "counterparty_legal_city",
    "counterparty_legal_postal_code",
    "counterparty_legal_country",
    "counterparty_legal_phone_number",
];

pub const DIM_LOCATION_COLUMNS: [&str; 8] = [
    "location_id",
    "address_line_1",
    "address_line_2",
    "district",
    "city",
    "postal_code",
    "country",
    "phone",
];

pub const DIM_CURRENCY_COLUMNS: [&str; 3] = ["currency_id", "currency_code", "currency_name"];

pub const DIM_STAFF_COLUMNS: [&str; 6] = [
    "staff_id",
    "first_name",
    "last_name",
    "department_name",
    "location",
    "email_address",
];

pub const DIM_DESIGN_COLUMNS: [&str; 4] = ["design_id", "design_name", "file_location", "file_name"];

/// Counterparties with their legal address inlined
pub fn dim_counterparty(counterparty: &Table, address: &Table) -> PipelineResult<Table> {
    Ok(counterparty
        .left_join(address, "legal_address_id", "address_id", &ADDRESS_FIELDS)?
        .rename(&COUNTERPARTY_ADDRESS_RENAMES)
        .select(&DIM_COUNTERPARTY_COLUMNS)?
        .with_name("dim_counterparty"))
}

pub fn dim_location(address: &Table) -> PipelineResult<Table> {
    Ok(address
        .clone()
        .rename(&[("address_id", "location_id")])
        .select(&DIM_LOCATION_COLUMNS)?
        .drop_duplicates()
        .with_name("dim_location"))
}

/// Currencies with a display name; unknown codes get a null name
pub fn dim_currency(currency: &Table) -> PipelineResult<Table> {
    let names = Table::from_rows(
        "currency_names",
        ["currency_code", "currency_name"],
        CURRENCY_NAMES
            .iter()
            .map(|(code, name)| vec![Value::from(*code), Value::from(*name)])
            .collect(),
    )?;

    Ok(currency
        .left_join(&names, "currency_code", "currency_code", &["currency_name"])?
        .select(&DIM_CURRENCY_COLUMNS)?
        .with_name("dim_currency"))
}

pub fn dim_staff(staff: &Table, department: &Table) -> PipelineResult<Table> {
    Ok(staff
        .left_join(
            department,
            "department_id",
            "department_id",
            &["department_name", "location"],
        )?
        .select(&DIM_STAFF_COLUMNS)?
        .drop_duplicates()
        .with_name("dim_staff"))
}

pub fn dim_design(design: &Table) -> PipelineResult<Table> {
    Ok(design
        .select(&DIM_DESIGN_COLUMNS)?
        .drop_duplicates()
        .with_name("dim_design"))
}
