// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Compile-time constant values.
//!
//! A [`ConstantValue`] is the result of evaluating a constant
//! expression: a literal, an enum member, a `Const` initializer, an
//! `Optional` parameter default, or an attribute argument. Values carry
//! their concrete primitive type; integral values are held as `i128` so
//! every primitive range fits with room for overflow checks.
//!
//! Conversion uses the explicit numeric table plus a representability
//! check — converting `300` to `Byte` fails even though `Integer` to
//! `Byte` is a legal explicit conversion, because the *value* does not
//! fit.

use ecow::EcoString;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::source_analysis::DateValue;

use super::types::{PrimitiveKind, TypeId, converts_to};

/// A resolved compile-time value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// An integral value of one of the eight integer primitives.
    Int { value: i128, kind: PrimitiveKind },
    /// A `Single` or `Double` value.
    Float { value: f64, kind: PrimitiveKind },
    /// A `Decimal` value.
    DecimalValue(Decimal),
    /// A `Boolean` value.
    Bool(bool),
    /// A `Char` value.
    Char(char),
    /// A `String` value.
    Str(EcoString),
    /// A `Date` value.
    Date(DateValue),
    /// The `Nothing` reference.
    Null,
    /// An enumeration member: the enum type plus its underlying value.
    EnumValue {
        ty: TypeId,
        underlying: PrimitiveKind,
        value: i128,
    },
    /// A type reference (`GetType(T)`), legal as an attribute argument.
    TypeRef(TypeId),
}

/// Why a constant conversion or fold failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantError {
    /// The value does not fit the target type.
    NotRepresentable,
    /// No conversion exists between the types involved.
    NoConversion,
    /// The operator is not defined for the operand types.
    OperatorNotDefined,
    /// Integral division by zero.
    DivisionByZero,
}

impl ConstantValue {
    /// The primitive kind of this value, if it has one. Enum values
    /// answer with their underlying primitive.
    #[must_use]
    pub const fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Int { kind, .. } | Self::Float { kind, .. } => Some(*kind),
            Self::DecimalValue(_) => Some(PrimitiveKind::Decimal),
            Self::Bool(_) => Some(PrimitiveKind::Boolean),
            Self::Char(_) => Some(PrimitiveKind::Char),
            Self::Str(_) => Some(PrimitiveKind::Str),
            Self::Date(_) => Some(PrimitiveKind::Date),
            Self::EnumValue { underlying, .. } => Some(*underlying),
            Self::Null | Self::TypeRef(_) => None,
        }
    }

    /// A short description for diagnostics.
    #[must_use]
    pub fn describe(&self) -> EcoString {
        match self {
            Self::Int { value, .. } => EcoString::from(value.to_string()),
            Self::Float { value, .. } => EcoString::from(value.to_string()),
            Self::DecimalValue(value) => EcoString::from(value.to_string()),
            Self::Bool(true) => "True".into(),
            Self::Bool(false) => "False".into(),
            Self::Char(c) => EcoString::from(c.to_string()),
            Self::Str(s) => s.clone(),
            Self::Date(_) => "#date#".into(),
            Self::Null => "Nothing".into(),
            Self::EnumValue { value, .. } => EcoString::from(value.to_string()),
            Self::TypeRef(_) => "GetType(...)".into(),
        }
    }

    /// Converts this value to the target primitive, checking that the
    /// result is representable. Enum values convert through their
    /// underlying integral value.
    pub fn convert_to(&self, target: PrimitiveKind) -> Result<Self, ConstantError> {
        use PrimitiveKind as P;

        let source = self.primitive_kind().ok_or(ConstantError::NoConversion)?;
        if !converts_to(source, target) {
            return Err(ConstantError::NoConversion);
        }

        match (self, target) {
            // Integral sources (including enum values).
            (Self::Int { value, .. } | Self::EnumValue { value, .. }, t) if t.is_integral() => {
                int_to_integral(*value, t)
            }
            (Self::Int { value, .. } | Self::EnumValue { value, .. }, P::Single | P::Double) => {
                #[expect(clippy::cast_precision_loss, reason = "widening to floating point")]
                let widened = *value as f64;
                Ok(Self::Float {
                    value: widened,
                    kind: target,
                })
            }
            (Self::Int { value, .. } | Self::EnumValue { value, .. }, P::Decimal) => {
                Decimal::from_i128(*value)
                    .map(Self::DecimalValue)
                    .ok_or(ConstantError::NotRepresentable)
            }
            (Self::Int { value, .. } | Self::EnumValue { value, .. }, P::Boolean) => {
                Ok(Self::Bool(*value != 0))
            }

            // Floating sources.
            (Self::Float { value, .. }, t) if t.is_integral() => {
                if !value.is_finite() {
                    return Err(ConstantError::NotRepresentable);
                }
                let rounded = value.round();
                if rounded < -1.0e38 || rounded > 1.0e38 {
                    return Err(ConstantError::NotRepresentable);
                }
                #[expect(clippy::cast_possible_truncation, reason = "bounds checked above")]
                let integral = rounded as i128;
                int_to_integral(integral, t)
            }
            (Self::Float { value, .. }, P::Single) => {
                #[expect(clippy::cast_possible_truncation, reason = "narrowing to Single")]
                let narrowed = *value as f32;
                if value.is_finite() && !narrowed.is_finite() {
                    return Err(ConstantError::NotRepresentable);
                }
                Ok(Self::Float {
                    value: f64::from(narrowed),
                    kind: P::Single,
                })
            }
            (Self::Float { value, .. }, P::Double) => Ok(Self::Float {
                value: *value,
                kind: P::Double,
            }),
            (Self::Float { value, .. }, P::Decimal) => Decimal::from_f64(*value)
                .map(Self::DecimalValue)
                .ok_or(ConstantError::NotRepresentable),
            (Self::Float { value, .. }, P::Boolean) => Ok(Self::Bool(*value != 0.0)),

            // Decimal sources.
            (Self::DecimalValue(value), t) if t.is_integral() => {
                let rounded = value.round();
                rounded
                    .to_i128()
                    .ok_or(ConstantError::NotRepresentable)
                    .and_then(|v| int_to_integral(v, t))
            }
            (Self::DecimalValue(value), P::Single | P::Double) => value
                .to_f64()
                .map(|v| Self::Float {
                    value: v,
                    kind: target,
                })
                .ok_or(ConstantError::NotRepresentable),
            (Self::DecimalValue(value), P::Decimal) => Ok(Self::DecimalValue(*value)),
            (Self::DecimalValue(value), P::Boolean) => Ok(Self::Bool(!value.is_zero())),

            // Boolean sources: True is -1, or the all-ones pattern for
            // the unsigned types.
            (Self::Bool(value), t) if t.is_integral() => {
                let (min, max) = t.integral_range().expect("integral target");
                let raw = if *value {
                    if min == 0 { max } else { -1 }
                } else {
                    0
                };
                Ok(Self::Int {
                    value: raw,
                    kind: t,
                })
            }
            (Self::Bool(value), P::Single | P::Double) => Ok(Self::Float {
                value: if *value { -1.0 } else { 0.0 },
                kind: target,
            }),
            (Self::Bool(value), P::Decimal) => Ok(Self::DecimalValue(Decimal::from(
                if *value { -1 } else { 0 },
            ))),
            (Self::Bool(value), P::Boolean) => Ok(Self::Bool(*value)),

            // Character and string.
            (Self::Char(c), P::Str) => Ok(Self::Str(EcoString::from(c.to_string()))),
            (Self::Char(c), P::Char) => Ok(Self::Char(*c)),
            (Self::Str(s), P::Char) => {
                s.chars().next().map(Self::Char).ok_or(ConstantError::NotRepresentable)
            }
            (Self::Str(s), P::Str) => Ok(Self::Str(s.clone())),
            (Self::Date(d), P::Date) => Ok(Self::Date(*d)),

            _ => Err(ConstantError::NoConversion),
        }
    }
}

fn int_to_integral(value: i128, target: PrimitiveKind) -> Result<ConstantValue, ConstantError> {
    let (min, max) = target.integral_range().expect("integral target");
    if value < min || value > max {
        return Err(ConstantError::NotRepresentable);
    }
    Ok(ConstantValue::Int {
        value,
        kind: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use PrimitiveKind as P;

    fn int(value: i128, kind: P) -> ConstantValue {
        ConstantValue::Int { value, kind }
    }

    #[test]
    fn integral_narrowing_checks_the_value() {
        assert_eq!(
            int(200, P::Integer).convert_to(P::Byte),
            Ok(int(200, P::Byte))
        );
        assert_eq!(
            int(300, P::Integer).convert_to(P::Byte),
            Err(ConstantError::NotRepresentable)
        );
        assert_eq!(
            int(-1, P::Integer).convert_to(P::ULong),
            Err(ConstantError::NotRepresentable)
        );
    }

    #[test]
    fn float_to_integral_rounds() {
        let v = ConstantValue::Float {
            value: 2.6,
            kind: P::Double,
        };
        assert_eq!(v.convert_to(P::Short), Ok(int(3, P::Short)));
    }

    #[test]
    fn infinite_float_is_not_representable() {
        let v = ConstantValue::Float {
            value: f64::INFINITY,
            kind: P::Double,
        };
        assert_eq!(v.convert_to(P::Long), Err(ConstantError::NotRepresentable));
    }

    #[test]
    fn boolean_conversions_use_all_ones() {
        assert_eq!(
            ConstantValue::Bool(true).convert_to(P::Integer),
            Ok(int(-1, P::Integer))
        );
        assert_eq!(
            ConstantValue::Bool(true).convert_to(P::Byte),
            Ok(int(255, P::Byte))
        );
        assert_eq!(
            ConstantValue::Bool(false).convert_to(P::Byte),
            Ok(int(0, P::Byte))
        );
        assert_eq!(
            int(42, P::Integer).convert_to(P::Boolean),
            Ok(ConstantValue::Bool(true))
        );
    }

    #[test]
    fn string_char_conversions() {
        assert_eq!(
            ConstantValue::Char('a').convert_to(P::Str),
            Ok(ConstantValue::Str("a".into()))
        );
        assert_eq!(
            ConstantValue::Str("xyz".into()).convert_to(P::Char),
            Ok(ConstantValue::Char('x'))
        );
        assert_eq!(
            ConstantValue::Str(EcoString::new()).convert_to(P::Char),
            Err(ConstantError::NotRepresentable)
        );
    }

    #[test]
    fn date_has_no_numeric_conversion() {
        let v = ConstantValue::Date(DateValue::ZERO);
        assert_eq!(v.convert_to(P::Integer), Err(ConstantError::NoConversion));
    }

    #[test]
    fn enum_values_convert_through_their_underlying() {
        let v = ConstantValue::EnumValue {
            ty: TypeId::new(7),
            underlying: P::Byte,
            value: 2,
        };
        assert_eq!(v.convert_to(P::Integer), Ok(int(2, P::Integer)));
        assert_eq!(v.primitive_kind(), Some(P::Byte));
    }

    #[test]
    fn decimal_round_trips() {
        let v = ConstantValue::DecimalValue(Decimal::new(25, 1)); // 2.5
        // Banker's rounding: 2.5 rounds to 2.
        assert_eq!(v.convert_to(P::Integer), Ok(int(2, P::Integer)));
        let ConstantValue::Float { value, .. } = v.convert_to(P::Double).unwrap() else {
            panic!("expected float");
        };
        assert!((value - 2.5).abs() < f64::EPSILON);
    }
}
