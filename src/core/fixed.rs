use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Number of decimal places in a [`Perquintill`] fraction.
pub const PERQUINTILL_DECIMALS: u32 = 18;

/// Errors arising from fixed-point construction and arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumericError {
    #[error("malformed numeric string {input:?}")]
    Parse { input: String },
    #[error("scale mismatch: {left} vs {right} decimals")]
    ScaleMismatch { left: u32, right: u32 },
    #[error("division by zero")]
    DivisionByZero,
    #[error("fraction {value} outside [0, 1]")]
    FractionRange { value: String },
    #[error("{value} does not fit in a decimal")]
    DecimalRange { value: String },
}

/// Rounding policy applied whenever a result must land on an integer unit.
///
/// `Nearest` resolves ties away from zero; that tie-break is used everywhere
/// in this crate a nearest-rounding occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rounding {
    /// Round to the closest unit, ties away from zero.
    Nearest,
    /// Round toward zero.
    Down,
    /// Round away from zero.
    Up,
}

pub(crate) fn pow10(exponent: u32) -> BigInt {
    num_traits::pow(BigInt::from(10), exponent as usize)
}

/// Integer division with an explicit rounding policy.
///
/// The denominator must be nonzero; callers check before dividing.
pub(crate) fn div_rounded(numer: &BigInt, denom: &BigInt, rounding: Rounding) -> BigInt {
    debug_assert!(!denom.is_zero());
    let (numer, denom) = if denom.is_negative() {
        (-numer, -denom)
    } else {
        (numer.clone(), denom.clone())
    };
    let (quot, rem) = numer.div_rem(&denom);
    if rem.is_zero() {
        return quot;
    }
    let bump = match rounding {
        Rounding::Down => false,
        Rounding::Up => true,
        Rounding::Nearest => rem.abs() * 2 >= denom,
    };
    if !bump {
        quot
    } else if numer.is_negative() {
        quot - 1
    } else {
        quot + 1
    }
}

/// An exact decimal quantity: arbitrary-precision integer `units` with an
/// immutable decimal `scale`, representing `units × 10^-scale`.
///
/// All financial magnitudes in this crate are `FixedPoint` values. Arithmetic
/// between two quantities of the same kind preserves the scale; changing the
/// scale is always an explicit [`FixedPoint::rescale`] with an explicit
/// [`Rounding`] choice — precision is never dropped silently.
///
/// # Examples
///
/// ```
/// use epoch_allocator::core::fixed::{FixedPoint, Rounding};
/// use rust_decimal_macros::dec;
///
/// let amount = FixedPoint::from_decimal(dec!(12.5), 6, Rounding::Nearest);
/// assert_eq!(amount.to_string(), "12.500000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedPoint {
    units: BigInt,
    scale: u32,
}

/// A pool-currency amount: a [`FixedPoint`] scaled to the pool's currency decimals.
pub type CurrencyBalance = FixedPoint;

impl FixedPoint {
    /// Zero at the given scale.
    pub fn zero(scale: u32) -> Self {
        Self {
            units: BigInt::zero(),
            scale,
        }
    }

    /// Construct from raw integer units.
    pub fn from_units(units: impl Into<BigInt>, scale: u32) -> Self {
        Self {
            units: units.into(),
            scale,
        }
    }

    /// Construct from a decimal string of integer units (e.g. `"2500000"`).
    pub fn from_unit_str(input: &str, scale: u32) -> Result<Self, NumericError> {
        let units = input
            .trim()
            .parse::<BigInt>()
            .map_err(|_| NumericError::Parse {
                input: input.to_string(),
            })?;
        Ok(Self { units, scale })
    }

    /// Construct from a decimal value, rounding to the nearest unit at the
    /// target scale according to `rounding`.
    pub fn from_decimal(value: Decimal, scale: u32, rounding: Rounding) -> Self {
        let numer = BigInt::from(value.mantissa()) * pow10(scale);
        let denom = pow10(value.scale());
        Self {
            units: div_rounded(&numer, &denom, rounding),
            scale,
        }
    }

    pub fn units(&self) -> &BigInt {
        &self.units
    }

    pub fn into_units(self) -> BigInt {
        self.units
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.units.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.units.is_negative()
    }

    /// Add a quantity of the same scale.
    pub fn checked_add(&self, rhs: &Self) -> Result<Self, NumericError> {
        self.ensure_same_scale(rhs)?;
        Ok(Self {
            units: &self.units + &rhs.units,
            scale: self.scale,
        })
    }

    /// Subtract a quantity of the same scale. The result may be negative.
    pub fn checked_sub(&self, rhs: &Self) -> Result<Self, NumericError> {
        self.ensure_same_scale(rhs)?;
        Ok(Self {
            units: &self.units - &rhs.units,
            scale: self.scale,
        })
    }

    /// Compare against a quantity of the same scale.
    pub fn checked_cmp(&self, rhs: &Self) -> Result<Ordering, NumericError> {
        self.ensure_same_scale(rhs)?;
        Ok(self.units.cmp(&rhs.units))
    }

    /// Re-express this quantity at a different scale.
    ///
    /// Scaling up is exact; scaling down rounds according to `rounding`.
    pub fn rescale(&self, scale: u32, rounding: Rounding) -> Self {
        match scale.cmp(&self.scale) {
            Ordering::Equal => self.clone(),
            Ordering::Greater => Self {
                units: &self.units * pow10(scale - self.scale),
                scale,
            },
            Ordering::Less => Self {
                units: div_rounded(&self.units, &pow10(self.scale - scale), rounding),
                scale,
            },
        }
    }

    /// Multiply by a fraction, keeping this quantity's scale.
    pub fn mul_fraction(&self, fraction: &Perquintill, rounding: Rounding) -> Self {
        let numer = &self.units * fraction.units();
        Self {
            units: div_rounded(&numer, &pow10(PERQUINTILL_DECIMALS), rounding),
            scale: self.scale,
        }
    }

    /// The fraction this quantity represents of `whole`.
    pub fn ratio_of(&self, whole: &Self, rounding: Rounding) -> Result<Perquintill, NumericError> {
        self.ensure_same_scale(whole)?;
        if whole.units.is_zero() {
            return Err(NumericError::DivisionByZero);
        }
        let numer = &self.units * pow10(PERQUINTILL_DECIMALS);
        Perquintill::from_units(div_rounded(&numer, &whole.units, rounding))
    }

    /// Convert to a [`Decimal`] for display or reporting.
    ///
    /// Fails if the magnitude exceeds the decimal range; it is never
    /// truncated silently.
    pub fn to_decimal(&self) -> Result<Decimal, NumericError> {
        let mantissa = self.units.to_i128().ok_or_else(|| NumericError::DecimalRange {
            value: self.to_string(),
        })?;
        Decimal::try_from_i128_with_scale(mantissa, self.scale).map_err(|_| {
            NumericError::DecimalRange {
                value: self.to_string(),
            }
        })
    }

    fn ensure_same_scale(&self, rhs: &Self) -> Result<(), NumericError> {
        if self.scale != rhs.scale {
            return Err(NumericError::ScaleMismatch {
                left: self.scale,
                right: rhs.scale,
            });
        }
        Ok(())
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.units);
        }
        let sign = if self.units.is_negative() { "-" } else { "" };
        let (int_part, frac_part) = self.units.abs().div_rem(&pow10(self.scale));
        let frac = frac_part.to_string();
        write!(
            f,
            "{}{}.{:0>width$}",
            sign,
            int_part,
            frac,
            width = self.scale as usize
        )
    }
}

/// An 18-decimal fixed-point fraction in `[0, 1]`.
///
/// Used for tranche ownership ratios, minimum risk buffers, and fulfillment
/// fractions. Construction is range-checked; a `Perquintill` can never hold
/// a value outside the unit interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Perquintill(FixedPoint);

impl Perquintill {
    pub fn zero() -> Self {
        Self(FixedPoint::zero(PERQUINTILL_DECIMALS))
    }

    pub fn one() -> Self {
        Self(FixedPoint::from_units(
            pow10(PERQUINTILL_DECIMALS),
            PERQUINTILL_DECIMALS,
        ))
    }

    /// Construct from raw 18-decimal units.
    pub fn from_units(units: impl Into<BigInt>) -> Result<Self, NumericError> {
        let fixed = FixedPoint::from_units(units, PERQUINTILL_DECIMALS);
        if fixed.units().is_negative() || fixed.units() > &pow10(PERQUINTILL_DECIMALS) {
            return Err(NumericError::FractionRange {
                value: fixed.to_string(),
            });
        }
        Ok(Self(fixed))
    }

    /// Construct from a rational `numer / denom`.
    pub fn from_rational(
        numer: impl Into<BigInt>,
        denom: impl Into<BigInt>,
        rounding: Rounding,
    ) -> Result<Self, NumericError> {
        let denom: BigInt = denom.into();
        if denom.is_zero() {
            return Err(NumericError::DivisionByZero);
        }
        let numer = numer.into() * pow10(PERQUINTILL_DECIMALS);
        Self::from_units(div_rounded(&numer, &denom, rounding))
    }

    /// Construct from a whole-number percentage.
    pub fn from_percent(percent: u32) -> Result<Self, NumericError> {
        Self::from_rational(percent, 100, Rounding::Nearest)
    }

    /// Construct from a decimal fraction such as `dec!(0.1)`.
    pub fn from_decimal(value: Decimal) -> Result<Self, NumericError> {
        let fixed = FixedPoint::from_decimal(value, PERQUINTILL_DECIMALS, Rounding::Nearest);
        Self::from_units(fixed.into_units())
    }

    pub fn units(&self) -> &BigInt {
        self.0.units()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.0.units() == &pow10(PERQUINTILL_DECIMALS)
    }

    /// `1 − self`.
    pub fn complement(&self) -> Self {
        Self(FixedPoint::from_units(
            pow10(PERQUINTILL_DECIMALS) - self.0.units(),
            PERQUINTILL_DECIMALS,
        ))
    }

    /// Approximate value as an `f64`, for solver coefficients and display.
    pub fn to_f64(&self) -> f64 {
        self.0.units().to_f64().unwrap_or(0.0) / 1e18
    }
}

impl PartialOrd for Perquintill {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Perquintill {
    fn cmp(&self, other: &Self) -> Ordering {
        self.units().cmp(other.units())
    }
}

impl fmt::Display for Perquintill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
