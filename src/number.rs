//! Scanning and classification of JSON number literals
//!
//! When decoding into an untyped slot, such as a [`Value`](crate::value::Value), the
//! representation of a number is chosen from the digit counts of the literal so that no
//! precision is lost. Numbers which cannot be represented exactly fall back to their
//! literal text, which is then materialized as a string.
//!
//! When decoding into a statically known number type, the literal is parsed directly to
//! that type, see [`FromJsonNumber`].

use std::fmt::{Display, Formatter};

use duplicate::duplicate_item;

/// Maximum number of significant digits for which a `f64` is exact enough
const MAX_F64_DIGITS: u32 = 16;
/// Maximum number of exponent digits (without leading 0s) for a `f64`
const MAX_F64_EXPONENT_DIGITS: u32 = 3;
/// Maximum number of integer digits which always fit into an `i64`
const MAX_SAFE_I64_DIGITS: u32 = 18;
/// Maximum number of significant digits of a [`Decimal`]
pub const MAX_DECIMAL_DIGITS: u32 = 28;

/// Digit counts of a scanned number literal
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub(crate) struct NumberRun {
    /// Length of the literal in bytes
    pub len: usize,
    /// Number of integer digits, without leading 0s
    pub integer_digits: u32,
    /// Number of significant fraction digits, including trailing 0s
    ///
    /// Leading 0s of the fraction are only significant if the integer part is not 0.
    pub fraction_digits: u32,
    /// Number of exponent digits, without sign and without leading 0s
    pub exponent_digits: u32,
    pub has_fraction: bool,
    pub has_exponent: bool,
}

/// Scans the number literal at the start of `bytes`
///
/// Returns `None` if the run of number characters is not a valid JSON number, for
/// example `01`, `1.` or `-`. The caller is responsible for checking that the run is
/// not followed by other non-structural characters, for example `1a`.
pub(crate) fn scan_number(bytes: &[u8]) -> Option<NumberRun> {
    #[derive(PartialEq)]
    enum State {
        Start,
        Minus,
        IntZero,
        IntNonZero,
        DecimalPoint,
        DecimalDigit,
        ExpE,
        ExpSign,
        ExpDigit,
    }

    let mut state = State::Start;
    let mut run = NumberRun {
        len: 0,
        integer_digits: 0,
        fraction_digits: 0,
        exponent_digits: 0,
        has_fraction: false,
        has_exponent: false,
    };

    for &byte in bytes {
        state = match (state, byte) {
            (State::Start, b'-') => State::Minus,
            (State::ExpE, b'-' | b'+') => State::ExpSign,
            (State::Start | State::Minus, b'0') => State::IntZero,
            (State::Start | State::Minus | State::IntNonZero, b'1'..=b'9') => {
                run.integer_digits += 1;
                State::IntNonZero
            }
            (State::IntNonZero, b'0') => {
                run.integer_digits += 1;
                State::IntNonZero
            }
            (State::IntZero | State::IntNonZero, b'.') => {
                run.has_fraction = true;
                State::DecimalPoint
            }
            (State::DecimalPoint | State::DecimalDigit, b'0'..=b'9') => {
                if byte != b'0' || run.integer_digits > 0 || run.fraction_digits > 0 {
                    run.fraction_digits += 1;
                }
                State::DecimalDigit
            }
            (State::IntZero | State::IntNonZero | State::DecimalDigit, b'e' | b'E') => {
                run.has_exponent = true;
                State::ExpE
            }
            (State::ExpE | State::ExpSign | State::ExpDigit, b'0'..=b'9') => {
                // Don't count leading 0s
                if byte != b'0' || run.exponent_digits > 0 {
                    run.exponent_digits += 1;
                }
                State::ExpDigit
            }
            (_, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') => {
                // Unexpected trailing number char, e.g. "01" or "1.2.3"
                return None;
            }
            (state, _) => {
                return finish(state, run);
            }
        };
        run.len += 1;
    }

    fn finish(state: State, run: NumberRun) -> Option<NumberRun> {
        match state {
            State::IntZero | State::IntNonZero | State::DecimalDigit | State::ExpDigit => Some(run),
            _ => None,
        }
    }
    finish(state, run)
}

/// How numbers which exceed the precision of `i64` and `f64` are decoded into untyped slots
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub enum NumberMode {
    /// Numbers which cannot be represented exactly as `i32`, `i64` or `f64` are decoded
    /// as their literal text
    #[default]
    Auto,
    /// Like [`Auto`](Self::Auto), except that numbers with at most
    /// 28 significant digits and without exponent are decoded as [`Decimal`]
    Decimal,
}

/// Number materialized in an untyped slot
///
/// Equality compares integers by value regardless of their width.
#[derive(Clone, Copy, Debug)]
pub enum Number {
    /// Integer which fits into an `i32`
    I32(i32),
    /// Integer which fits into an `i64`
    I64(i64),
    /// Floating point number
    F64(f64),
    /// Exact decimal number
    Decimal(Decimal),
}

impl Number {
    /// Gets the number as `i64`, if it is an integer
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::I32(n) => Some(n.into()),
            Number::I64(n) => Some(n),
            _ => None,
        }
    }

    /// Gets the number as `f64`, possibly losing precision
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::I32(n) => n.into(),
            Number::I64(n) => n as f64,
            Number::F64(n) => n,
            Number::Decimal(d) => d.to_f64(),
        }
    }

    /// Whether the number is zero
    pub fn is_zero(&self) -> bool {
        match *self {
            Number::I32(n) => n == 0,
            Number::I64(n) => n == 0,
            Number::F64(n) => n == 0.0,
            Number::Decimal(d) => d.mantissa == 0,
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::F64(a), Number::F64(b)) => a == b,
            (Number::Decimal(a), Number::Decimal(b)) => a == b,
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::I32(n) => write!(f, "{n}"),
            Number::I64(n) => write!(f, "{n}"),
            Number::F64(n) => write!(f, "{n}"),
            Number::Decimal(d) => write!(f, "{d}"),
        }
    }
}

#[duplicate_item(type_template variant; [i32] [I32]; [f64] [F64]; [Decimal] [Decimal])]
impl From<type_template> for Number {
    fn from(value: type_template) -> Self {
        Number::variant(value)
    }
}

impl From<i64> for Number {
    /// Narrows to [`Number::I32`] if the value fits, like numbers decoded into untyped slots
    fn from(value: i64) -> Self {
        match i32::try_from(value) {
            Ok(value) => Number::I32(value),
            Err(_) => Number::I64(value),
        }
    }
}

/// Exact decimal number `mantissa * 10^-scale`
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct Decimal {
    /// Unscaled value
    pub mantissa: i128,
    /// Number of fraction digits
    pub scale: u32,
}

impl Decimal {
    /// Parses a literal without exponent which has at most [`MAX_DECIMAL_DIGITS`]
    /// significant digits
    fn from_literal(literal: &str) -> Option<Decimal> {
        let (int_part, fraction_part) = match literal.split_once('.') {
            Some((int_part, fraction_part)) => (int_part, fraction_part),
            None => (literal, ""),
        };
        let (negative, int_part) = match int_part.strip_prefix('-') {
            Some(int_part) => (true, int_part),
            None => (false, int_part),
        };

        let mut mantissa: i128 = 0;
        let mut significant_digits = 0;
        for b in int_part.bytes().chain(fraction_part.bytes()) {
            let digit = match b {
                b'0'..=b'9' => i128::from(b - b'0'),
                _ => return None,
            };
            if mantissa != 0 || digit != 0 {
                significant_digits += 1;
            }
            if significant_digits > MAX_DECIMAL_DIGITS {
                return None;
            }
            mantissa = mantissa * 10 + digit;
        }

        Some(Decimal {
            mantissa: if negative { -mantissa } else { mantissa },
            scale: u32::try_from(fraction_part.len()).ok()?,
        })
    }

    /// Converts to `f64`, possibly losing precision
    pub fn to_f64(&self) -> f64 {
        // Round trips through the textual form to get correct rounding
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut itoa_buf = itoa::Buffer::new();
        let digits = itoa_buf.format(self.mantissa.unsigned_abs());
        if self.mantissa < 0 {
            f.write_str("-")?;
        }

        let scale = self.scale as usize;
        if scale == 0 {
            return f.write_str(digits);
        }
        if digits.len() > scale {
            let (int_part, fraction_part) = digits.split_at(digits.len() - scale);
            write!(f, "{int_part}.{fraction_part}")
        } else {
            f.write_str("0.")?;
            for _ in digits.len()..scale {
                f.write_str("0")?;
            }
            f.write_str(digits)
        }
    }
}

/// Chooses the representation of a number literal for an untyped slot
///
/// Returns `None` if the number cannot be represented without loss of precision; the
/// caller materializes the literal text instead.
pub(crate) fn classify_number(literal: &str, run: &NumberRun, mode: NumberMode) -> Option<Number> {
    if run.has_exponent {
        if run.integer_digits + run.fraction_digits <= MAX_F64_DIGITS
            && run.exponent_digits <= MAX_F64_EXPONENT_DIGITS
        {
            return parse_finite_f64(literal).map(Number::F64);
        }
        return None;
    }

    if run.has_fraction {
        if run.integer_digits + run.fraction_digits <= MAX_F64_DIGITS {
            return parse_finite_f64(literal).map(Number::F64);
        }
        return decimal_fallback(literal, mode);
    }

    if run.integer_digits <= MAX_SAFE_I64_DIGITS {
        let n: i64 = literal.parse().ok()?;
        return Some(match i32::try_from(n) {
            Ok(n) => Number::I32(n),
            Err(_) => Number::I64(n),
        });
    }
    // 19 digits can still fit, for example `i64::MAX`
    if let Ok(n) = literal.parse::<i64>() {
        return Some(Number::I64(n));
    }
    decimal_fallback(literal, mode)
}

fn decimal_fallback(literal: &str, mode: NumberMode) -> Option<Number> {
    match mode {
        NumberMode::Auto => None,
        NumberMode::Decimal => Decimal::from_literal(literal).map(Number::Decimal),
    }
}

fn parse_finite_f64(literal: &str) -> Option<f64> {
    literal.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Sealed trait for number types which can be parsed from a JSON number literal
///
/// Used by [`Deserializer::read_number`](crate::reader::Deserializer::read_number).
pub trait FromJsonNumber: private::Sealed + Sized {
    /// Name of the type, used for error messages
    const TYPE_NAME: &'static str;

    /// Parses the literal, returning `None` if it is out of range for this type
    ///
    /// Literals with fraction or exponent are out of range for integer types, even if their
    /// value is integral, and non-finite results are out of range for floating point types.
    fn from_json_number(literal: &str) -> Option<Self>;
}

mod private {
    use super::*;

    pub trait Sealed {}

    #[duplicate_item(type_template; [u8]; [i8]; [u16]; [i16]; [u32]; [i32]; [u64]; [i64]; [u128]; [i128]; [usize]; [isize]; [f32]; [f64]; [Decimal])]
    impl Sealed for type_template {}
}

#[duplicate_item(type_template; [u8]; [i8]; [u16]; [i16]; [u32]; [i32]; [u64]; [i64]; [u128]; [i128]; [usize]; [isize])]
impl FromJsonNumber for type_template {
    const TYPE_NAME: &'static str = stringify!(type_template);

    fn from_json_number(literal: &str) -> Option<Self> {
        // "-0" is a valid integer for unsigned types as well
        if literal == "-0" {
            return Some(0);
        }
        literal.parse().ok()
    }
}

#[duplicate_item(type_template; [f32]; [f64])]
impl FromJsonNumber for type_template {
    const TYPE_NAME: &'static str = stringify!(type_template);

    fn from_json_number(literal: &str) -> Option<Self> {
        literal
            .parse::<type_template>()
            .ok()
            .filter(|n| n.is_finite())
    }
}

impl FromJsonNumber for Decimal {
    const TYPE_NAME: &'static str = "Decimal";

    fn from_json_number(literal: &str) -> Option<Self> {
        Decimal::from_literal(literal)
    }
}
