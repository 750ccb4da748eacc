//! Conversions between [`Value`] and PostgreSQL wire types.
//!
//! Integers, floats, text and bytes map onto the matching [`Value`] variants.
//! Dates, times, UUIDs and JSON are read as text. NUMERIC is read as text
//! too, keeping its exact decimal digits. Parameters of these types are
//! parsed from text values.

use crate::models::{FromValue, Value};
use crate::storage::{BackendFault, DriverError, DriverResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt::Write as _;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

type WireError = Box<dyn std::error::Error + Sync + Send>;

// NUMERIC sign words.
const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// A NUMERIC column value in exact decimal text form.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Numeric(String);

impl<'a> FromSql<'a> for Numeric {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, WireError> {
        decode_numeric(raw).map(Self)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// A NUMERIC parameter, already encoded.
#[derive(Debug)]
struct NumericParam(Vec<u8>);

impl ToSql for NumericParam {
    fn to_sql(&self, _: &Type, out: &mut BytesMut) -> Result<IsNull, WireError> {
        out.extend_from_slice(&self.0);
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }

    to_sql_checked!();
}

/// Converts `value` into a parameter of the type the server inferred.
pub(super) fn bind_value(ty: &Type, value: &Value) -> DriverResult<Box<dyn ToSql + Sync>> {
    let bound: Box<dyn ToSql + Sync> = match *ty {
        Type::BOOL => Box::new(convert::<bool>(ty, value)?),
        Type::INT2 => Box::new(convert::<i16>(ty, value)?),
        Type::INT4 => Box::new(convert::<i32>(ty, value)?),
        Type::INT8 => Box::new(convert::<i64>(ty, value)?),
        Type::OID => Box::new(convert::<u32>(ty, value)?),
        Type::FLOAT4 => Box::new(convert::<f32>(ty, value)?),
        Type::FLOAT8 => Box::new(convert::<f64>(ty, value)?),
        Type::BYTEA => Box::new(convert::<Vec<u8>>(ty, value)?),
        Type::NUMERIC => Box::new(numeric_param(ty, value)?),
        Type::DATE => Box::new(parse_text(ty, value, |s| s.parse::<NaiveDate>().ok())?),
        Type::TIME => Box::new(parse_text(ty, value, |s| s.parse::<NaiveTime>().ok())?),
        Type::TIMESTAMP => Box::new(parse_text(ty, value, parse_timestamp)?),
        Type::TIMESTAMPTZ => Box::new(parse_text(ty, value, parse_timestamptz)?),
        Type::UUID => Box::new(parse_text(ty, value, |s| Uuid::parse_str(s).ok())?),
        Type::JSON | Type::JSONB => Box::new(json_param(ty, value)?),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            Box::new(convert::<String>(ty, value)?)
        },
        _ => {
            return Err(BackendFault::Unsupported(format!(
                "cannot bind parameters of type {ty}"
            ))
            .into());
        },
    };
    Ok(bound)
}

/// Reads every column of `row`.
pub(super) fn row_values(row: &Row) -> DriverResult<Vec<Value>> {
    let mut values = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value: Value = match *ty {
            Type::BOOL => row.try_get::<_, Option<bool>>(i)?.into(),
            Type::INT2 => row.try_get::<_, Option<i16>>(i)?.into(),
            Type::INT4 => row.try_get::<_, Option<i32>>(i)?.into(),
            Type::INT8 => row.try_get::<_, Option<i64>>(i)?.into(),
            Type::OID => row.try_get::<_, Option<u32>>(i)?.into(),
            Type::FLOAT4 => row.try_get::<_, Option<f32>>(i)?.into(),
            Type::FLOAT8 => row.try_get::<_, Option<f64>>(i)?.into(),
            Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(i)?.into(),
            Type::NUMERIC => row.try_get::<_, Option<Numeric>>(i)?.map(|n| n.0).into(),
            Type::DATE => text(row.try_get::<_, Option<NaiveDate>>(i)?),
            Type::TIME => text(row.try_get::<_, Option<NaiveTime>>(i)?),
            Type::TIMESTAMP => text(row.try_get::<_, Option<NaiveDateTime>>(i)?),
            Type::TIMESTAMPTZ => row
                .try_get::<_, Option<DateTime<Utc>>>(i)?
                .map(|t| t.to_rfc3339())
                .into(),
            Type::UUID => text(row.try_get::<_, Option<Uuid>>(i)?),
            Type::JSON | Type::JSONB => text(row.try_get::<_, Option<serde_json::Value>>(i)?),
            _ if <String as FromSql<'_>>::accepts(ty) => {
                row.try_get::<_, Option<String>>(i)?.into()
            },
            _ => {
                return Err(BackendFault::Unsupported(format!(
                    "cannot read column '{}' of type {ty}",
                    column.name()
                ))
                .into());
            },
        };
        values.push(value);
    }
    Ok(values)
}

fn text<T: ToString>(value: Option<T>) -> Value {
    value.map(|v| v.to_string()).into()
}

fn unsupported(ty: &Type, value: &Value) -> DriverError {
    BackendFault::Unsupported(format!("cannot bind {} value '{value}' as {ty}", value.kind())).into()
}

fn convert<T: FromValue>(ty: &Type, value: &Value) -> DriverResult<Option<T>> {
    if value.is_null() {
        return Ok(None);
    }
    T::from_value(value.clone())
        .map(Some)
        .ok_or_else(|| unsupported(ty, value))
}

fn parse_text<T>(
    ty: &Type,
    value: &Value,
    parse: impl FnOnce(&str) -> Option<T>,
) -> DriverResult<Option<T>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => parse(s.trim()).map(Some).ok_or_else(|| unsupported(ty, value)),
        _ => Err(unsupported(ty, value)),
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    s.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
}

fn parse_timestamptz(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_timestamp(s).map(|t| t.and_utc()))
}

fn json_param(ty: &Type, value: &Value) -> DriverResult<Option<serde_json::Value>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => serde_json::from_str(s)
            .map(Some)
            .map_err(|_| unsupported(ty, value)),
        Value::Blob(_) => Err(unsupported(ty, value)),
        other => Ok(Some(serde_json::to_value(other)?)),
    }
}

fn numeric_param(ty: &Type, value: &Value) -> DriverResult<Option<NumericParam>> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(s) => s.trim().to_string(),
        Value::Blob(_) => return Err(unsupported(ty, value)),
    };
    encode_numeric(&text)
        .map(|raw| Some(NumericParam(raw)))
        .ok_or_else(|| unsupported(ty, value))
}

/// Encodes decimal text in the NUMERIC binary format: four header words
/// (digit count, weight, sign, display scale) followed by base-10000 digits.
fn encode_numeric(text: &str) -> Option<Vec<u8>> {
    let (negative, body) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    match body.to_ascii_lowercase().as_str() {
        "nan" => return numeric_wire(NUMERIC_NAN, 0, 0, &[]),
        "inf" | "infinity" => {
            let sign = if negative { NUMERIC_NINF } else { NUMERIC_PINF };
            return numeric_wire(sign, 0, 0, &[]);
        },
        _ => {},
    }

    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part
        .bytes()
        .chain(frac_part.bytes())
        .all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let dscale = u16::try_from(frac_part.len()).ok()?;
    let int_part = int_part.trim_start_matches('0');
    let int_pad = (4 - int_part.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;
    let padded = "0".repeat(int_pad) + int_part + frac_part + &"0".repeat(frac_pad);

    let mut groups: Vec<u16> = padded
        .as_bytes()
        .chunks(4)
        .map(|chunk| chunk.iter().fold(0_u16, |acc, d| acc * 10 + u16::from(d - b'0')))
        .collect();
    let mut weight = i32::try_from((int_pad + int_part.len()) / 4).ok()? - 1;
    let leading = groups.iter().take_while(|&&g| g == 0).count();
    groups.drain(..leading);
    weight -= i32::try_from(leading).ok()?;
    while groups.last() == Some(&0) {
        groups.pop();
    }
    if groups.is_empty() {
        weight = 0;
    }
    let sign = if negative && !groups.is_empty() {
        NUMERIC_NEG
    } else {
        NUMERIC_POS
    };
    numeric_wire(sign, i16::try_from(weight).ok()?, dscale, &groups)
}

fn numeric_wire(sign: u16, weight: i16, dscale: u16, digits: &[u16]) -> Option<Vec<u8>> {
    let ndigits = u16::try_from(digits.len()).ok()?;
    let mut raw = Vec::with_capacity(8 + 2 * digits.len());
    raw.extend_from_slice(&ndigits.to_be_bytes());
    raw.extend_from_slice(&weight.to_be_bytes());
    raw.extend_from_slice(&sign.to_be_bytes());
    raw.extend_from_slice(&dscale.to_be_bytes());
    for digit in digits {
        raw.extend_from_slice(&digit.to_be_bytes());
    }
    Some(raw)
}

/// Renders a NUMERIC binary value as decimal text with its display scale.
fn decode_numeric(raw: &[u8]) -> Result<String, WireError> {
    let word = |i: usize| -> Result<[u8; 2], WireError> {
        raw.get(2 * i..2 * i + 2)
            .and_then(|b| <[u8; 2]>::try_from(b).ok())
            .ok_or_else(|| WireError::from("truncated NUMERIC value"))
    };
    let ndigits = usize::from(u16::from_be_bytes(word(0)?));
    let weight = i32::from(i16::from_be_bytes(word(1)?));
    let sign = u16::from_be_bytes(word(2)?);
    let dscale = usize::from(u16::from_be_bytes(word(3)?));
    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {},
        other => return Err(format!("invalid NUMERIC sign {other:#06x}").into()),
    }
    let digits = (0..ndigits)
        .map(|i| word(4 + i).map(u16::from_be_bytes))
        .collect::<Result<Vec<_>, _>>()?;
    // Digit `i` carries weight `weight - i`; positions past the stored digits are zero.
    let digit = |i: i32| {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        write!(out, "{}", digit(0))?;
        for i in 1..=weight {
            write!(out, "{:04}", digit(i))?;
        }
    }
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            write!(frac, "{:04}", digit(i))?;
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Ok(out)
}
