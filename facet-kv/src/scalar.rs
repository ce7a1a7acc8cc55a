//! Intrinsic value parsing: turning raw value bytes into scalars.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use core::time::Duration;

use jiff::SignedDuration;

use crate::error::{DecodeError, DecodeErrorKind};
use crate::ip::IpMask;
use crate::schema::{FieldKind, FloatWidth, IntWidth, IpFamily};

/// A parsed scalar, already narrowed to the width of its target field.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScalarValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    ISize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    USize(usize),
    F32(f32),
    F64(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Duration(Duration),
    IpAddr(IpAddr),
    Ipv4Addr(Ipv4Addr),
    Ipv6Addr(Ipv6Addr),
    IpMask(IpMask),
}

impl ScalarValue {
    /// The value a field of `kind` holds when no pair sets it, for kinds whose
    /// types have no `Default` of their own.
    pub(crate) fn zero(kind: FieldKind) -> Option<Self> {
        match kind {
            FieldKind::Duration => Some(ScalarValue::Duration(Duration::ZERO)),
            FieldKind::IpAddr(family) => Some(unspecified(family)),
            FieldKind::IpMask => Some(ScalarValue::IpMask(IpMask::UNSPECIFIED)),
            _ => None,
        }
    }
}

/// Parse `raw` as a value of `kind`.
///
/// Only scalar kinds have an intrinsic conversion; records and text-decodable
/// types are handled by the caller.
pub(crate) fn parse_scalar(raw: &[u8], kind: FieldKind) -> Result<ScalarValue, DecodeError> {
    let fail = |reason: String| value_error(raw, kind, reason);

    match kind {
        FieldKind::Bytes => Ok(ScalarValue::Bytes(raw.to_vec())),
        FieldKind::String => String::from_utf8(raw.to_vec())
            .map(ScalarValue::String)
            .map_err(|e| fail(e.to_string())),
        FieldKind::Signed(width) => {
            let wide: i128 = text(raw, kind)?.parse().map_err(|e| fail(parse_reason(e)))?;
            narrow_signed(wide, width).ok_or_else(|| fail(out_of_range(kind)))
        }
        FieldKind::Unsigned(width) => {
            let wide: u128 = text(raw, kind)?.parse().map_err(|e| fail(parse_reason(e)))?;
            narrow_unsigned(wide, width).ok_or_else(|| fail(out_of_range(kind)))
        }
        FieldKind::Float(FloatWidth::F32) => text(raw, kind)?
            .parse()
            .map(ScalarValue::F32)
            .map_err(|e| fail(parse_reason(e))),
        FieldKind::Float(FloatWidth::F64) => text(raw, kind)?
            .parse()
            .map(ScalarValue::F64)
            .map_err(|e| fail(parse_reason(e))),
        FieldKind::Bool => parse_bool(text(raw, kind)?)
            .map(ScalarValue::Bool)
            .ok_or_else(|| fail("expected one of 1, t, T, TRUE, true, True, 0, f, F, FALSE, false, False".into())),
        FieldKind::Duration => parse_duration(text(raw, kind)?)
            .map(ScalarValue::Duration)
            .map_err(fail),
        FieldKind::IpAddr(family) => parse_ip(text(raw, kind)?, family).map_err(fail),
        FieldKind::IpMask => {
            let s = text(raw, kind)?;
            if s.is_empty() {
                return Ok(ScalarValue::IpMask(IpMask::UNSPECIFIED));
            }
            s.parse()
                .map(ScalarValue::IpMask)
                .map_err(|e| fail(parse_reason(e)))
        }
        FieldKind::Record | FieldKind::Text => Err(fail("no intrinsic conversion".into())),
    }
}

fn text(raw: &[u8], kind: FieldKind) -> Result<&str, DecodeError> {
    core::str::from_utf8(raw).map_err(|e| value_error(raw, kind, e.to_string()))
}

pub(crate) fn value_error(raw: &[u8], kind: FieldKind, reason: String) -> DecodeError {
    DecodeError::new(DecodeErrorKind::ValueParse {
        kind,
        value: String::from_utf8_lossy(raw).into_owned(),
        reason,
    })
}

fn parse_reason(err: impl core::fmt::Display) -> String {
    err.to_string()
}

fn out_of_range(kind: FieldKind) -> String {
    alloc::format!("out of range for {kind}")
}

fn narrow_signed(wide: i128, width: IntWidth) -> Option<ScalarValue> {
    Some(match width {
        IntWidth::W8 => ScalarValue::I8(wide.try_into().ok()?),
        IntWidth::W16 => ScalarValue::I16(wide.try_into().ok()?),
        IntWidth::W32 => ScalarValue::I32(wide.try_into().ok()?),
        IntWidth::W64 => ScalarValue::I64(wide.try_into().ok()?),
        IntWidth::W128 => ScalarValue::I128(wide),
        IntWidth::Size => ScalarValue::ISize(wide.try_into().ok()?),
    })
}

fn narrow_unsigned(wide: u128, width: IntWidth) -> Option<ScalarValue> {
    Some(match width {
        IntWidth::W8 => ScalarValue::U8(wide.try_into().ok()?),
        IntWidth::W16 => ScalarValue::U16(wide.try_into().ok()?),
        IntWidth::W32 => ScalarValue::U32(wide.try_into().ok()?),
        IntWidth::W64 => ScalarValue::U64(wide.try_into().ok()?),
        IntWidth::W128 => ScalarValue::U128(wide),
        IntWidth::Size => ScalarValue::USize(wide.try_into().ok()?),
    })
}

/// The boolean spellings accepted by Go's `strconv.ParseBool`, which is what
/// consul-style tooling writes.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Parses `30s`, `1h30m`, `250ms`, `1.5h` as well as ISO 8601 (`PT30S`).
fn parse_duration(s: &str) -> Result<Duration, String> {
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    let signed: SignedDuration = s.parse().map_err(|e: jiff::Error| e.to_string())?;
    Duration::try_from(signed).map_err(|e| e.to_string())
}

fn parse_ip(s: &str, family: IpFamily) -> Result<ScalarValue, String> {
    if s.is_empty() {
        return Ok(unspecified(family));
    }
    let addr: IpAddr = s.parse().map_err(parse_reason)?;
    match (family, addr) {
        (IpFamily::Any, addr) => Ok(ScalarValue::IpAddr(addr)),
        (IpFamily::V4, IpAddr::V4(v4)) => Ok(ScalarValue::Ipv4Addr(v4)),
        (IpFamily::V4, IpAddr::V6(v6)) => v6
            .to_ipv4_mapped()
            .map(ScalarValue::Ipv4Addr)
            .ok_or_else(|| "not an IPv4 address".to_string()),
        (IpFamily::V6, IpAddr::V6(v6)) => Ok(ScalarValue::Ipv6Addr(v6)),
        (IpFamily::V6, IpAddr::V4(v4)) => Ok(ScalarValue::Ipv6Addr(v4.to_ipv6_mapped())),
    }
}

fn unspecified(family: IpFamily) -> ScalarValue {
    match family {
        IpFamily::Any => ScalarValue::IpAddr(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        IpFamily::V4 => ScalarValue::Ipv4Addr(Ipv4Addr::UNSPECIFIED),
        IpFamily::V6 => ScalarValue::Ipv6Addr(Ipv6Addr::UNSPECIFIED),
    }
}

/// Split the first record of `input` into fields, following RFC 4180 quoting.
///
/// Quoted fields may contain commas, newlines and doubled quotes (`""`). A quote inside
/// an unquoted field, or text after a closing quote, is an error. Leading blank lines are
/// skipped and anything after the first record is ignored. Empty input yields no fields.
pub(crate) fn split_csv(input: &str) -> Result<Vec<String>, String> {
    let input = input.trim_start_matches(['\r', '\n']);
    let mut fields = Vec::new();
    if input.is_empty() {
        return Ok(fields);
    }

    let mut chars = input.chars().peekable();
    loop {
        let mut field = String::new();
        let record_done;

        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => return Err("extraneous or missing \" in quoted-field".into()),
                }
            }
            record_done = match chars.next() {
                Some(',') => false,
                None | Some('\n') => true,
                Some('\r') if matches!(chars.peek(), None | Some('\n')) => true,
                Some(_) => return Err("extraneous or missing \" in quoted-field".into()),
            };
        } else {
            loop {
                match chars.next() {
                    Some(',') => {
                        record_done = false;
                        break;
                    }
                    None | Some('\n') => {
                        record_done = true;
                        break;
                    }
                    Some('\r') if matches!(chars.peek(), None | Some('\n')) => {
                        record_done = true;
                        break;
                    }
                    Some('"') => return Err("bare \" in non-quoted-field".into()),
                    Some(c) => field.push(c),
                }
            }
        }

        fields.push(field);
        if record_done {
            return Ok(fields);
        }
    }
}

/// Split `input` on runs of whitespace.
pub(crate) fn split_ssv(input: &str) -> Vec<&str> {
    input.split_whitespace().collect()
}
