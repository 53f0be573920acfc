//! Dynamic values and their numeric coercion rules.
//!
//! A [`ValueWrapper`] is a mutable cell: arithmetic updates the receiver in place.
//! Before any operation both operands are coerced:
//!
//! 1. `null` counts as integer `0`;
//! 2. strings are parsed as an integer, failing that as a double, failing that
//!    the operation fails with [`CoercionError`];
//! 3. if either side is a double, the other side is promoted to double;
//! 4. two integers use 32-bit integer arithmetic, anything else double arithmetic.
//!
//! Integer division by zero is carried out in double arithmetic, so it yields
//! `Infinity`, `-Infinity` or `NaN` rather than failing.

use std::cmp::Ordering;
use std::fmt;

/// A value stored in a wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i32),
    Double(f64),
    String(String),
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Double(value) => f.write_str(&format_double(*value)),
            Value::String(value) => f.write_str(value),
        }
    }
}

/// A string operand that is neither an integer nor a double.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Cannot convert '{value}' to a number")]
pub struct CoercionError {
    pub value: String,
}

/// An operand after coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Integer(i32),
    Double(f64),
}

impl Number {
    fn from_value(value: &Value) -> Result<Number, CoercionError> {
        match value {
            Value::Null => Ok(Number::Integer(0)),
            Value::Integer(v) => Ok(Number::Integer(*v)),
            Value::Double(v) => Ok(Number::Double(*v)),
            Value::String(s) => parse_number(s),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(v) => f64::from(v),
            Number::Double(v) => v,
        }
    }
}

fn parse_number(text: &str) -> Result<Number, CoercionError> {
    if let Ok(v) = text.parse::<i32>() {
        return Ok(Number::Integer(v));
    }
    text.trim()
        .parse::<f64>()
        .map(Number::Double)
        .map_err(|_| CoercionError {
            value: text.to_string(),
        })
}

/// Coerced operand pair: either both integers or both doubles.
enum Operands {
    Integers(i32, i32),
    Doubles(f64, f64),
}

fn coerce(first: &Value, second: &Value) -> Result<Operands, CoercionError> {
    let first = Number::from_value(first)?;
    let second = Number::from_value(second)?;
    Ok(match (first, second) {
        (Number::Integer(a), Number::Integer(b)) => Operands::Integers(a, b),
        (a, b) => Operands::Doubles(a.as_f64(), b.as_f64()),
    })
}

/// A mutable cell holding one dynamic value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueWrapper {
    value: Value,
}

impl ValueWrapper {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn null() -> Self {
        Self { value: Value::Null }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Numeric view of the wrapped value, as used by arithmetic.
    pub fn to_f64(&self) -> Result<f64, CoercionError> {
        Number::from_value(&self.value).map(Number::as_f64)
    }

    pub fn add(&mut self, other: &Value) -> Result<(), CoercionError> {
        self.value = match coerce(&self.value, other)? {
            Operands::Integers(a, b) => Value::Integer(a.wrapping_add(b)),
            Operands::Doubles(a, b) => Value::Double(a + b),
        };
        Ok(())
    }

    pub fn subtract(&mut self, other: &Value) -> Result<(), CoercionError> {
        self.value = match coerce(&self.value, other)? {
            Operands::Integers(a, b) => Value::Integer(a.wrapping_sub(b)),
            Operands::Doubles(a, b) => Value::Double(a - b),
        };
        Ok(())
    }

    pub fn multiply(&mut self, other: &Value) -> Result<(), CoercionError> {
        self.value = match coerce(&self.value, other)? {
            Operands::Integers(a, b) => Value::Integer(a.wrapping_mul(b)),
            Operands::Doubles(a, b) => Value::Double(a * b),
        };
        Ok(())
    }

    /// Divide in place. Integer division by zero falls back to double division.
    pub fn divide(&mut self, other: &Value) -> Result<(), CoercionError> {
        self.value = match coerce(&self.value, other)? {
            Operands::Integers(a, b) if b != 0 => Value::Integer(a.wrapping_div(b)),
            Operands::Integers(a, b) => Value::Double(f64::from(a) / f64::from(b)),
            Operands::Doubles(a, b) => Value::Double(a / b),
        };
        Ok(())
    }

    /// Raise to a power. Integers stay integers for non-negative exponents.
    pub fn power(&mut self, other: &Value) -> Result<(), CoercionError> {
        self.value = match coerce(&self.value, other)? {
            Operands::Integers(a, b) if b >= 0 => Value::Integer(a.wrapping_pow(b.unsigned_abs())),
            Operands::Integers(a, b) => Value::Double(f64::from(a).powi(b)),
            Operands::Doubles(a, b) => Value::Double(a.powf(b)),
        };
        Ok(())
    }

    /// Three-way numeric comparison after coercion.
    ///
    /// Doubles order `-0.0` before `0.0` and `NaN` after everything else.
    pub fn num_compare(&self, other: &Value) -> Result<Ordering, CoercionError> {
        Ok(match coerce(&self.value, other)? {
            Operands::Integers(a, b) => a.cmp(&b),
            Operands::Doubles(a, b) => compare_doubles(a, b),
        })
    }
}

impl fmt::Display for ValueWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

fn compare_doubles(a: f64, b: f64) -> Ordering {
    if a < b {
        return Ordering::Less;
    }
    if a > b {
        return Ordering::Greater;
    }
    // Equal or unordered: fall back to canonical bit patterns.
    let bits = |v: f64| -> i64 {
        if v.is_nan() {
            0x7ff8_0000_0000_0000
        } else {
            v.to_bits() as i64
        }
    };
    bits(a).cmp(&bits(b))
}

/// Shortest decimal text of a double that always shows a fraction, switching to
/// `d.dddE±n` outside `[1e-3, 1e7)`.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }

    let magnitude = value.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        let text = format!("{value:?}");
        return if text.contains('.') { text } else { format!("{text}.0") };
    }

    let text = format!("{value:e}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{mantissa}E{exponent}"),
        Some((mantissa, exponent)) => format!("{mantissa}.0E{exponent}"),
        None => text,
    }
}
