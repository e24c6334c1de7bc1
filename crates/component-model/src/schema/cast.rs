use std::net::IpAddr;

use serde_json::{Number, Value};

use super::ArgType;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CastError {
    #[error("the value is not {0}")]
    Invalid(&'static str),
    #[error("value '{value}' is not one of {}", itertools::join(.allowed.iter().map(|value| format!("'{value}'")), ", "))]
    NotInEnum { value: String, allowed: Vec<String> },
    #[error("element '{key}': {source}")]
    Element {
        key: String,
        #[source]
        source: Box<CastError>,
    },
}

/// Coerces a literal into the declared type of its argument.
pub fn cast(ty: &ArgType, value: Value) -> Result<Value, CastError> {
    match ty {
        ArgType::Mixed => Ok(value),
        ArgType::Array(item) => cast_array(item.as_deref(), value),
        ty => match value {
            Value::Array(_) => Err(CastError::Invalid(expected(ty))),
            value => cast_scalar(ty, value),
        },
    }
}

fn cast_array(item: Option<&ArgType>, value: Value) -> Result<Value, CastError> {
    let Some(item) = item else {
        return match value {
            Value::Array(_) | Value::Object(_) => Ok(value),
            _ => Err(CastError::Invalid("an array")),
        };
    };
    let element = |key: String, value: Value| {
        cast(item, value).map_err(|source| CastError::Element {
            key,
            source: Box::new(source),
        })
    };
    match value {
        Value::Array(values) => values
            .into_iter()
            .enumerate()
            .map(|(index, value)| element(index.to_string(), value))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        // Keyed lists fold into objects.
        Value::Object(entries) => entries
            .into_iter()
            .map(|(key, value)| element(key.clone(), value).map(|value| (key, value)))
            .collect::<Result<serde_json::Map<_, _>, _>>()
            .map(Value::Object),
        _ => Err(CastError::Invalid("an array")),
    }
}

fn cast_scalar(ty: &ArgType, value: Value) -> Result<Value, CastError> {
    let invalid = || CastError::Invalid(expected(ty));
    match (ty, value) {
        (ArgType::Id, value @ Value::String(_)) => Ok(value),
        (ArgType::Id, Value::Number(number)) if number.is_u64() || number.is_i64() => Ok(Value::Number(number)),

        (ArgType::String, value @ Value::String(_)) => Ok(value),
        (ArgType::String, Value::Number(number)) => Ok(Value::String(number.to_string())),
        (ArgType::String, Value::Bool(value)) => Ok(Value::String(value.to_string())),

        (ArgType::Int, Value::Number(number)) => match number.as_i64() {
            Some(int) => Ok(int.into()),
            None => number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
                .map(|float| Value::from(float as i64))
                .ok_or_else(invalid),
        },
        (ArgType::Int, Value::String(string)) => string.trim().parse::<i64>().map(Value::from).map_err(|_| invalid()),

        (ArgType::Float, Value::Number(number)) => Ok(Value::Number(number)),
        (ArgType::Float, Value::String(string)) => string
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),

        (ArgType::Bool, value @ Value::Bool(_)) => Ok(value),
        (ArgType::Bool, Value::String(string)) => match string.as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" | "" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        (ArgType::Bool, Value::Number(number)) => match number.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(invalid()),
        },

        (ArgType::Date, Value::String(string)) => chrono::NaiveDate::parse_from_str(&string, "%Y-%m-%d")
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .map_err(|_| invalid()),
        (ArgType::Url, Value::String(string)) => url::Url::parse(&string)
            .map(|url| Value::String(url.into()))
            .map_err(|_| invalid()),
        (ArgType::Email, Value::String(string)) if is_email(&string) => Ok(Value::String(string)),
        (ArgType::Ip, Value::String(string)) => string
            .parse::<IpAddr>()
            .map(|ip| Value::String(ip.to_string()))
            .map_err(|_| invalid()),

        (ArgType::Object, value @ Value::Object(_)) => Ok(value),

        (ArgType::Enum(allowed), Value::String(string)) => {
            if allowed.contains(&string) {
                Ok(Value::String(string))
            } else {
                Err(CastError::NotInEnum {
                    value: string,
                    allowed: allowed.clone(),
                })
            }
        }

        _ => Err(invalid()),
    }
}

fn expected(ty: &ArgType) -> &'static str {
    match ty {
        ArgType::Mixed => "a value",
        ArgType::Id => "an id",
        ArgType::String => "a string",
        ArgType::Int => "an integer",
        ArgType::Float => "a float",
        ArgType::Bool => "a boolean",
        ArgType::Date => "a date formatted as 'YYYY-MM-DD'",
        ArgType::Url => "a URL",
        ArgType::Email => "an email",
        ArgType::Ip => "an IP address",
        ArgType::Object => "an object",
        ArgType::Enum(_) => "an enum value",
        ArgType::Array(_) => "an array",
    }
}

fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() > 1
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    }
}
