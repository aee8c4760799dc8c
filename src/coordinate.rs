//! Fixed-point packed coordinates, as used on the Gerber wire.
//!
//! A format specification such as `%FSLAX24Y24*%` says how many integer and decimal digits a coordinate
//! carries and which zeros may be omitted. `X151892` with leading zeros omitted and 2.4 digits is
//! `15.1892`, with trailing zeros omitted it is `15.1892` too, but `X15` means `0.0015` and `15.0` respectively.

use std::fmt::{Display, Formatter};

use crate::error::CoordinateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ZeroSuppression {
    /// Digits are right-justified, missing leading zeros are implied. `FSL`
    SkipLeading,
    /// Digits are left-justified, missing trailing zeros are implied. `FST`
    SkipTrailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoordinateNotation {
    Absolute,
    /// Deprecated, X/Y values are relative to the current point.
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisFormat {
    pub integer_digits: u8,
    pub decimal_digits: u8,
}

impl AxisFormat {
    pub const fn new(integer_digits: u8, decimal_digits: u8) -> Self {
        Self {
            integer_digits,
            decimal_digits,
        }
    }

    pub fn total_digits(&self) -> usize {
        self.integer_digits as usize + self.decimal_digits as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    I,
    J,
}

/// The raw digits of one coordinate value, with an optional sign, e.g. `-015`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackedCoordinate(String);

impl PackedCoordinate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackedCoordinate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Display for PackedCoordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoordinateFormat {
    pub zeros: ZeroSuppression,
    pub notation: CoordinateNotation,
    pub x: AxisFormat,
    pub y: AxisFormat,
}

impl CoordinateFormat {
    pub const fn new(zeros: ZeroSuppression, notation: CoordinateNotation, x: AxisFormat, y: AxisFormat) -> Self {
        Self {
            zeros,
            notation,
            x,
            y,
        }
    }

    /// Absolute notation, same digit counts for both axes.
    pub const fn absolute(zeros: ZeroSuppression, integer_digits: u8, decimal_digits: u8) -> Self {
        let axis = AxisFormat::new(integer_digits, decimal_digits);
        Self::new(zeros, CoordinateNotation::Absolute, axis, axis)
    }

    /// I shares the X format, J shares the Y format.
    pub fn axis_format(&self, axis: Axis) -> AxisFormat {
        match axis {
            Axis::X | Axis::I => self.x,
            Axis::Y | Axis::J => self.y,
        }
    }

    pub fn pack(&self, axis: Axis, value: f64) -> Result<PackedCoordinate, CoordinateError> {
        let AxisFormat {
            integer_digits,
            decimal_digits,
        } = self.axis_format(axis);
        let integer_digits = integer_digits as usize;

        let formatted = format!("{:.*}", decimal_digits as usize, value.abs());
        let (integer_part, decimal_part) = formatted
            .split_once('.')
            .unwrap_or((formatted.as_str(), ""));

        let integer_part = integer_part.trim_start_matches('0');
        if integer_part.len() > integer_digits {
            return Err(CoordinateError::TooLong {
                raw: formatted.clone(),
                max_digits: integer_digits,
            });
        }

        let digits = format!("{:0>width$}{}", integer_part, decimal_part, width = integer_digits);
        let significant = match self.zeros {
            ZeroSuppression::SkipLeading => digits.trim_start_matches('0'),
            ZeroSuppression::SkipTrailing => digits.trim_end_matches('0'),
        };

        if significant.is_empty() {
            return Ok(PackedCoordinate::new("0"));
        }

        let sign = if value < 0.0 { "-" } else { "" };
        Ok(PackedCoordinate(format!("{}{}", sign, significant)))
    }

    pub fn unpack(&self, axis: Axis, raw: &PackedCoordinate) -> Result<f64, CoordinateError> {
        let format = self.axis_format(axis);
        let raw = raw.as_str();

        let (negative, digits) = match raw.as_bytes().first() {
            Some(b'-') => (true, &raw[1..]),
            Some(b'+') => (false, &raw[1..]),
            _ => (false, raw),
        };

        if digits.is_empty() {
            return Err(CoordinateError::TooShort(raw.to_string()));
        }
        if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(CoordinateError::Invalid(raw.to_string()));
        }

        let total = format.total_digits();
        if digits.len() > total {
            return Err(CoordinateError::TooLong {
                raw: raw.to_string(),
                max_digits: total,
            });
        }

        let padded = match self.zeros {
            ZeroSuppression::SkipLeading => format!("{:0>width$}", digits, width = total),
            ZeroSuppression::SkipTrailing => format!("{:0<width$}", digits, width = total),
        };
        let (integer_part, decimal_part) = padded.split_at(format.integer_digits as usize);
        let text = if decimal_part.is_empty() {
            integer_part.to_string()
        } else {
            format!("{}.{}", integer_part, decimal_part)
        };

        let value: f64 = text
            .parse()
            .map_err(|_| CoordinateError::Invalid(raw.to_string()))?;

        Ok(if negative { -value } else { value })
    }
}

impl Display for CoordinateFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let zeros = match self.zeros {
            ZeroSuppression::SkipLeading => 'L',
            ZeroSuppression::SkipTrailing => 'T',
        };
        let notation = match self.notation {
            CoordinateNotation::Absolute => 'A',
            CoordinateNotation::Incremental => 'I',
        };
        write!(
            f,
            "FS{}{}X{}{}Y{}{}",
            zeros, notation, self.x.integer_digits, self.x.decimal_digits, self.y.integer_digits, self.y.decimal_digits
        )
    }
}
