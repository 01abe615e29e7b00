//! Fixed-scale decimal value types
//!
//! `Money`, `Percent`, `Quantity` and `DecimalValue` wrap a `rust_decimal::Decimal`
//! held at a fixed scale. A value is in exactly one of three states:
//!
//! - defined: a number, rounded half-to-even to the kind's scale
//! - invalid: the text it was built from did not parse; the text is kept
//! - empty: never set
//!
//! Construction never fails. Invalid values raise only when an operation is
//! attempted on them, so a bad configuration cell is reported where it is used.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{NumericError, NumericResult};

/// Compile-time description of a value type: its name and fixed scale
pub trait NumericKind: Copy + fmt::Debug + Default + Send + Sync + 'static {
    const NAME: &'static str;
    const SCALE: u32;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MoneyKind;

impl NumericKind for MoneyKind {
    const NAME: &'static str = "Money";
    const SCALE: u32 = 2;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PercentKind;

impl NumericKind for PercentKind {
    const NAME: &'static str = "Percent";
    const SCALE: u32 = 4;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QuantityKind;

impl NumericKind for QuantityKind {
    const NAME: &'static str = "Quantity";
    const SCALE: u32 = 0;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DecimalKind;

impl NumericKind for DecimalKind {
    const NAME: &'static str = "Decimal";
    const SCALE: u32 = 4;
}

/// Dollar amounts, scale 2
pub type Money = Numeric<MoneyKind>;
/// Fractions (0.02 = 2%), scale 4
pub type Percent = Numeric<PercentKind>;
/// Share counts, scale 0
pub type Quantity = Numeric<QuantityKind>;
/// Generic decimal, scale 4
pub type DecimalValue = Numeric<DecimalKind>;

#[derive(Debug, Clone, Hash)]
enum Repr {
    Defined(Decimal),
    Invalid(String),
    Empty,
}

/// A fixed-scale decimal with an explicit valid/invalid/empty state
#[derive(Debug, Clone, Hash)]
pub struct Numeric<K: NumericKind> {
    repr: Repr,
    _kind: PhantomData<K>,
}

impl<K: NumericKind> Numeric<K> {
    /// Build a defined value, rounding half-to-even to the kind's scale
    pub fn new(value: Decimal) -> Self {
        Self::from_repr(Repr::Defined(normalize::<K>(value)))
    }

    /// A value that was never set
    pub fn empty() -> Self {
        Self::from_repr(Repr::Empty)
    }

    /// Zero at the kind's scale
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Parse text into a value. Blank text is empty; unparseable text is invalid.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::empty();
        }
        match parse_plain_decimal(trimmed) {
            Some(value) => Self::new(value),
            None => Self::from_repr(Repr::Invalid(input.to_string())),
        }
    }

    fn from_repr(repr: Repr) -> Self {
        Self {
            repr,
            _kind: PhantomData,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self.repr, Repr::Defined(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.repr, Repr::Empty)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.repr, Repr::Invalid(_))
    }

    /// The captured text of an invalid value
    pub fn invalid_input(&self) -> Option<&str> {
        match &self.repr {
            Repr::Invalid(text) => Some(text),
            _ => None,
        }
    }

    /// The scale every defined value of this kind carries
    pub fn scale(&self) -> u32 {
        K::SCALE
    }

    /// The underlying decimal, or an error for invalid and empty values
    pub fn value(&self) -> NumericResult<Decimal> {
        match &self.repr {
            Repr::Defined(v) => Ok(*v),
            Repr::Invalid(input) => Err(invalid::<K>(input)),
            Repr::Empty => Err(NumericError::Empty { kind: K::NAME }),
        }
    }

    /// The value as `f64` (lossy)
    pub fn to_f64(&self) -> NumericResult<f64> {
        let v = self.value()?;
        v.to_f64().ok_or_else(|| invalid::<K>(&v.to_string()))
    }

    pub fn add(&self, other: &Self) -> NumericResult<Self> {
        Ok(Self::new(self.value()? + other.value()?))
    }

    pub fn subtract(&self, other: &Self) -> NumericResult<Self> {
        Ok(Self::new(self.value()? - other.value()?))
    }

    pub fn multiply(&self, factor: Decimal) -> NumericResult<Self> {
        let v = self.value()?;
        v.checked_mul(factor)
            .map(Self::new)
            .ok_or_else(|| invalid::<K>(&format!("{v} * {factor}")))
    }

    pub fn divide(&self, divisor: Decimal) -> NumericResult<Self> {
        let v = self.value()?;
        if divisor.is_zero() {
            return Err(NumericError::DivisionByZero);
        }
        v.checked_div(divisor)
            .map(Self::new)
            .ok_or_else(|| invalid::<K>(&format!("{v} / {divisor}")))
    }

    /// Compare two values. Empty sorts below any defined value; invalid raises.
    pub fn compare(&self, other: &Self) -> NumericResult<Ordering> {
        match (&self.repr, &other.repr) {
            (Repr::Invalid(input), _) | (_, Repr::Invalid(input)) => Err(invalid::<K>(input)),
            (Repr::Empty, Repr::Empty) => Ok(Ordering::Equal),
            (Repr::Empty, Repr::Defined(_)) => Ok(Ordering::Less),
            (Repr::Defined(_), Repr::Empty) => Ok(Ordering::Greater),
            (Repr::Defined(a), Repr::Defined(b)) => Ok(a.cmp(b)),
        }
    }

    /// Null-safe comparison: `None` behaves like an empty value
    pub fn compare_nullable(a: Option<&Self>, b: Option<&Self>) -> NumericResult<Ordering> {
        let empty = Self::empty();
        a.unwrap_or(&empty).compare(b.unwrap_or(&empty))
    }
}

impl<K: NumericKind> Default for Numeric<K> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: NumericKind> PartialEq for Numeric<K> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Defined(a), Repr::Defined(b)) => a == b,
            (Repr::Empty, Repr::Empty) => true,
            (Repr::Invalid(a), Repr::Invalid(b)) => a == b,
            _ => false,
        }
    }
}

impl<K: NumericKind> Eq for Numeric<K> {}

impl<K: NumericKind> PartialOrd for Numeric<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other).ok()
    }
}

impl<K: NumericKind> From<Decimal> for Numeric<K> {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl<K: NumericKind> FromStr for Numeric<K> {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<K: NumericKind> fmt::Display for Numeric<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Defined(v) => write!(f, "{v}"),
            Repr::Invalid(input) => write!(f, "{input}"),
            Repr::Empty => Ok(()),
        }
    }
}

impl<K: NumericKind> Serialize for Numeric<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de, K: NumericKind> Deserialize<'de> for Numeric<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NumericVisitor(PhantomData))
    }
}

struct NumericVisitor<K>(PhantomData<K>);

impl<K: NumericKind> Visitor<'_> for NumericVisitor<K> {
    type Value = Numeric<K>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {} as a string or number", K::NAME)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Numeric::parse(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Numeric::new(Decimal::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Numeric::new(Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        // Go through the shortest text form so 0.1 stays 0.1
        Ok(Numeric::parse(&v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Numeric::empty())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Numeric::empty())
    }
}

fn invalid<K: NumericKind>(input: &str) -> NumericError {
    NumericError::InvalidNumericState {
        kind: K::NAME,
        input: input.to_string(),
    }
}

fn normalize<K: NumericKind>(value: Decimal) -> Decimal {
    let mut v = value.round_dp_with_strategy(K::SCALE, RoundingStrategy::MidpointNearestEven);
    v.rescale(K::SCALE);
    if v.is_zero() {
        v.set_sign_positive(true);
    }
    v
}

/// Accepts `[+-]?digits[.digits]` with at least one digit; nothing else.
fn parse_plain_decimal(text: &str) -> Option<Decimal> {
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let mut digits = 0usize;
    let mut points = 0usize;
    for c in unsigned.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => points += 1,
            _ => return None,
        }
    }
    if digits == 0 || points > 1 {
        return None;
    }

    let mut body = String::with_capacity(unsigned.len() + 2);
    if unsigned.starts_with('.') {
        body.push('0');
    }
    body.push_str(unsigned);
    if unsigned.ends_with('.') {
        body.push('0');
    }

    let value = Decimal::from_str(&body).ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_rounds_half_to_even() {
        assert_eq!(Money::parse("1.005").value().unwrap(), dec!(1.00));
        assert_eq!(Money::parse("1.015").value().unwrap(), dec!(1.02));
        assert_eq!(Money::parse("-2.345").value().unwrap(), dec!(-2.34));
        assert_eq!(Quantity::parse("322.5").value().unwrap(), dec!(322));
        assert_eq!(Quantity::parse("323.5").value().unwrap(), dec!(324));
    }

    #[test]
    fn test_parse_fixed_scale() {
        let m = Money::parse("21");
        assert_eq!(m.to_string(), "21.00");
        assert_eq!(Percent::parse(".02").to_string(), "0.0200");
        assert_eq!(Money::parse("+5.").to_string(), "5.00");
        assert_eq!(Money::parse("-0").to_string(), "0.00");
    }

    #[test]
    fn test_invalid_is_captured_not_raised() {
        let m = Money::parse("12,50");
        assert!(m.is_invalid());
        assert_eq!(m.invalid_input(), Some("12,50"));
        assert_eq!(m.to_string(), "12,50");

        for text in ["abc", "1.2.3", "--1", "+", ".", "1e5", "1 000"] {
            assert!(Money::parse(text).is_invalid(), "{text} should be invalid");
        }
    }

    #[test]
    fn test_operations_on_invalid_raise() {
        let bad = Money::parse("n/a");
        let good = Money::parse("1.00");

        assert!(matches!(
            bad.add(&good),
            Err(NumericError::InvalidNumericState { kind: "Money", .. })
        ));
        assert!(matches!(
            good.subtract(&bad),
            Err(NumericError::InvalidNumericState { .. })
        ));
        assert!(bad.compare(&good).is_err());
        assert!(good.compare(&bad).is_err());
        assert!(bad.to_f64().is_err());
        assert!(bad.partial_cmp(&good).is_none());
    }

    #[test]
    fn test_empty_values() {
        let empty = Money::parse("   ");
        assert!(empty.is_empty());
        assert_eq!(empty.to_string(), "");
        assert_eq!(empty.add(&Money::zero()), Err(NumericError::Empty { kind: "Money" }));
        assert_eq!(Money::default(), Money::empty());
    }

    #[test]
    fn test_null_safe_comparison() {
        let one = Money::parse("1");
        let empty = Money::empty();

        assert_eq!(Money::compare_nullable(None, None).unwrap(), Ordering::Equal);
        assert_eq!(Money::compare_nullable(None, Some(&one)).unwrap(), Ordering::Less);
        assert_eq!(Money::compare_nullable(Some(&one), None).unwrap(), Ordering::Greater);
        assert_eq!(Money::compare_nullable(Some(&empty), None).unwrap(), Ordering::Equal);
        assert_eq!(empty.compare(&one).unwrap(), Ordering::Less);
        assert!(empty < one);
    }

    #[test]
    fn test_equality_is_numeric() {
        assert_eq!(Money::parse("1.5"), Money::parse("01.500"));
        assert_eq!(Money::parse("1.5"), Money::new(dec!(1.50)));
        assert_ne!(Money::parse("1.5"), Money::empty());
    }

    #[test]
    fn test_arithmetic_keeps_scale() {
        let a = Money::parse("21.51");
        let b = Money::parse("21.20");
        let d = a.subtract(&b).unwrap();
        assert_eq!(d.to_string(), "0.31");
        assert_eq!(d.scale(), 2);

        let third = Money::parse("100").divide(dec!(3)).unwrap();
        assert_eq!(third.to_string(), "33.33");
        assert_eq!(
            Money::parse("1").divide(Decimal::ZERO),
            Err(NumericError::DivisionByZero)
        );
        assert_eq!(
            Money::parse("2.50").multiply(dec!(3)).unwrap().to_string(),
            "7.50"
        );
    }

    #[test]
    fn test_serde_from_string_and_number() {
        let m: Money = serde_json::from_str("\"12.345\"").unwrap();
        assert_eq!(m.to_string(), "12.34");
        let p: Percent = serde_json::from_str("0.02").unwrap();
        assert_eq!(p.value().unwrap(), dec!(0.02));
        let q: Quantity = serde_json::from_str("100").unwrap();
        assert_eq!(q.value().unwrap(), dec!(100));
        let bad: Money = serde_json::from_str("\"oops\"").unwrap();
        assert!(bad.is_invalid());
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"12.34\"");
    }
}
