// src/table/infer.rs

use serde_json::{Number, Value};

/// Cell texts read as missing, in any column.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const TRUE_TOKENS: &[&str] = &["True", "TRUE", "true"];
const FALSE_TOKENS: &[&str] = &["False", "FALSE", "false"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
}

pub fn is_na(cell: &str) -> bool {
    NA_TOKENS.contains(&cell)
}

fn parse_bool(cell: &str) -> Option<bool> {
    if TRUE_TOKENS.contains(&cell) {
        Some(true)
    } else if FALSE_TOKENS.contains(&cell) {
        Some(false)
    } else {
        None
    }
}

fn parse_float(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Pick the narrowest type every non-missing cell fits.
///
/// An integer column with gaps widens to float, matching the usual dataframe
/// behaviour where a missing value forces a floating column.
pub fn infer_column<'a, I>(cells: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let (mut int, mut float, mut boolean) = (true, true, true);
    let mut has_na = false;
    let mut seen = false;

    for cell in cells {
        if is_na(cell) {
            has_na = true;
            continue;
        }
        seen = true;
        int &= cell.trim().parse::<i64>().is_ok();
        float &= parse_float(cell).is_some();
        boolean &= parse_bool(cell).is_some();
        if !(int || float || boolean) {
            return ColumnType::Text;
        }
    }

    match (seen, int, float, boolean) {
        (false, ..) => ColumnType::Float,
        (true, true, _, _) if has_na => ColumnType::Float,
        (true, true, _, _) => ColumnType::Integer,
        (true, _, true, _) => ColumnType::Float,
        (true, _, _, true) => ColumnType::Boolean,
        _ => ColumnType::Text,
    }
}

/// Convert one cell to JSON under an already inferred column type.
pub fn to_value(cell: &str, ty: ColumnType) -> Value {
    if is_na(cell) {
        return Value::Null;
    }
    match ty {
        ColumnType::Integer => cell
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        ColumnType::Float => parse_float(cell)
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColumnType::Boolean => parse_bool(cell).map(Value::Bool).unwrap_or(Value::Null),
        ColumnType::Text => Value::String(cell.to_string()),
    }
}
