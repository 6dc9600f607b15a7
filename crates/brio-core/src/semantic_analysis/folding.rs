// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Compile-time operator evaluation.
//!
//! Folding powers `Const` initializers, enum member values, `Optional`
//! parameter defaults, and attribute arguments. Operands are promoted to
//! a common type first: if either side is `Double`, `Single`, or
//! `Decimal` the fold happens there; otherwise both integral operands
//! widen to the smallest integral type that holds them both, and the
//! result must stay representable in that type.

use ecow::EcoString;
use rust_decimal::Decimal;

use crate::ast::{BinaryOp, UnaryOp};

use super::constants::{ConstantError, ConstantValue};
use super::types::{PrimitiveKind, widens_to};

/// Promotion order for integral folds.
const INTEGRAL_ORDER: [PrimitiveKind; 8] = [
    PrimitiveKind::SByte,
    PrimitiveKind::Byte,
    PrimitiveKind::Short,
    PrimitiveKind::UShort,
    PrimitiveKind::Integer,
    PrimitiveKind::UInteger,
    PrimitiveKind::Long,
    PrimitiveKind::ULong,
];

/// The smallest integral kind both operands widen to. `SByte` and
/// `ULong` have no common integral home, in which case the caller
/// falls back to `Long`.
pub(super) fn common_integral(a: PrimitiveKind, b: PrimitiveKind) -> Option<PrimitiveKind> {
    INTEGRAL_ORDER
        .into_iter()
        .find(|&k| widens_to(a, k) && widens_to(b, k))
}

/// Evaluates a binary operator over two constant values.
pub fn fold_binary(
    op: BinaryOp,
    left: &ConstantValue,
    right: &ConstantValue,
) -> Result<ConstantValue, ConstantError> {
    use ConstantValue as V;

    match op {
        BinaryOp::Concatenate => return fold_concatenate(left, right),
        BinaryOp::AndAlso | BinaryOp::OrElse => {
            let (V::Bool(a), V::Bool(b)) = (left, right) else {
                return Err(ConstantError::OperatorNotDefined);
            };
            return Ok(V::Bool(if op == BinaryOp::AndAlso {
                *a && *b
            } else {
                *a || *b
            }));
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
            if let (V::Bool(a), V::Bool(b)) = (left, right) {
                return Ok(V::Bool(match op {
                    BinaryOp::And => *a && *b,
                    BinaryOp::Or => *a || *b,
                    _ => *a != *b,
                }));
            }
            // Fall through to the integral bitwise fold below.
        }
        _ => {}
    }

    if let (V::Str(a), V::Str(b)) = (left, right) {
        return fold_string_comparison(op, a, b);
    }

    let (Some(lk), Some(rk)) = (left.primitive_kind(), right.primitive_kind()) else {
        return Err(ConstantError::OperatorNotDefined);
    };
    if !lk.is_numeric() || !rk.is_numeric() {
        return Err(ConstantError::OperatorNotDefined);
    }

    // Real division and exponentiation always fold in floating point.
    let force_float = matches!(op, BinaryOp::Divide | BinaryOp::Power);
    let use_decimal = lk == PrimitiveKind::Decimal || rk == PrimitiveKind::Decimal;
    let use_float = force_float
        || matches!(lk, PrimitiveKind::Single | PrimitiveKind::Double)
        || matches!(rk, PrimitiveKind::Single | PrimitiveKind::Double);

    if use_float {
        fold_float(op, as_f64(left)?, as_f64(right)?)
    } else if use_decimal {
        fold_decimal(op, as_decimal(left)?, as_decimal(right)?)
    } else {
        let kind = common_integral(lk, rk).unwrap_or(PrimitiveKind::Long);
        fold_integral(op, as_i128(left)?, as_i128(right)?, kind)
    }
}

/// Evaluates a unary operator over a constant value.
pub fn fold_unary(op: UnaryOp, operand: &ConstantValue) -> Result<ConstantValue, ConstantError> {
    use ConstantValue as V;
    match (op, operand) {
        (UnaryOp::Not, V::Bool(b)) => Ok(V::Bool(!*b)),
        (UnaryOp::Not, V::Int { value, kind }) => Ok(V::Int {
            value: !*value,
            kind: *kind,
        }),
        (UnaryOp::Plus, v) if v.primitive_kind().is_some_and(PrimitiveKind::is_numeric) => {
            Ok(v.clone())
        }
        (UnaryOp::Minus, V::Int { value, kind }) => {
            let negated = value.checked_neg().ok_or(ConstantError::NotRepresentable)?;
            let (min, max) = kind.integral_range().expect("integral kind");
            if negated < min || negated > max {
                // Negating the minimum of a signed type, or any nonzero
                // unsigned value, leaves the type: promote to Long.
                let (lmin, lmax) = PrimitiveKind::Long.integral_range().expect("range");
                if negated < lmin || negated > lmax {
                    return Err(ConstantError::NotRepresentable);
                }
                return Ok(V::Int {
                    value: negated,
                    kind: PrimitiveKind::Long,
                });
            }
            Ok(V::Int {
                value: negated,
                kind: *kind,
            })
        }
        (UnaryOp::Minus, V::Float { value, kind }) => Ok(V::Float {
            value: -*value,
            kind: *kind,
        }),
        (UnaryOp::Minus, V::DecimalValue(value)) => Ok(V::DecimalValue(-*value)),
        _ => Err(ConstantError::OperatorNotDefined),
    }
}

fn fold_concatenate(
    left: &ConstantValue,
    right: &ConstantValue,
) -> Result<ConstantValue, ConstantError> {
    let a = as_text(left)?;
    let b = as_text(right)?;
    let mut out = EcoString::from(a);
    out.push_str(&b);
    Ok(ConstantValue::Str(out))
}

fn as_text(value: &ConstantValue) -> Result<EcoString, ConstantError> {
    match value {
        ConstantValue::Str(s) => Ok(s.clone()),
        ConstantValue::Char(c) => Ok(EcoString::from(c.to_string())),
        other => {
            if other.primitive_kind().is_some_and(PrimitiveKind::is_numeric) {
                Ok(other.describe())
            } else {
                Err(ConstantError::OperatorNotDefined)
            }
        }
    }
}

fn fold_string_comparison(
    op: BinaryOp,
    a: &EcoString,
    b: &EcoString,
) -> Result<ConstantValue, ConstantError> {
    let ordering = a.as_str().cmp(b.as_str());
    let result = match op {
        BinaryOp::Equals => ordering.is_eq(),
        BinaryOp::NotEquals => !ordering.is_eq(),
        BinaryOp::Less => ordering.is_lt(),
        BinaryOp::LessEquals => ordering.is_le(),
        BinaryOp::Greater => ordering.is_gt(),
        BinaryOp::GreaterEquals => ordering.is_ge(),
        _ => return Err(ConstantError::OperatorNotDefined),
    };
    Ok(ConstantValue::Bool(result))
}

fn as_i128(value: &ConstantValue) -> Result<i128, ConstantError> {
    match value {
        ConstantValue::Int { value, .. } | ConstantValue::EnumValue { value, .. } => Ok(*value),
        _ => Err(ConstantError::OperatorNotDefined),
    }
}

fn as_f64(value: &ConstantValue) -> Result<f64, ConstantError> {
    use rust_decimal::prelude::ToPrimitive;
    match value {
        ConstantValue::Int { value, .. } | ConstantValue::EnumValue { value, .. } => {
            #[expect(clippy::cast_precision_loss, reason = "widening to floating point")]
            let widened = *value as f64;
            Ok(widened)
        }
        ConstantValue::Float { value, .. } => Ok(*value),
        ConstantValue::DecimalValue(value) => {
            value.to_f64().ok_or(ConstantError::NotRepresentable)
        }
        _ => Err(ConstantError::OperatorNotDefined),
    }
}

fn as_decimal(value: &ConstantValue) -> Result<Decimal, ConstantError> {
    use rust_decimal::prelude::FromPrimitive;
    match value {
        ConstantValue::Int { value, .. } | ConstantValue::EnumValue { value, .. } => {
            Decimal::from_i128(*value).ok_or(ConstantError::NotRepresentable)
        }
        ConstantValue::Float { value, .. } => {
            Decimal::from_f64(*value).ok_or(ConstantError::NotRepresentable)
        }
        ConstantValue::DecimalValue(value) => Ok(*value),
        _ => Err(ConstantError::OperatorNotDefined),
    }
}

fn fold_integral(
    op: BinaryOp,
    a: i128,
    b: i128,
    kind: PrimitiveKind,
) -> Result<ConstantValue, ConstantError> {
    let comparison = |result: bool| Ok(ConstantValue::Bool(result));
    let value = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Subtract => a.checked_sub(b),
        BinaryOp::Multiply => a.checked_mul(b),
        BinaryOp::IntDivide => {
            if b == 0 {
                return Err(ConstantError::DivisionByZero);
            }
            a.checked_div(b)
        }
        BinaryOp::Modulo => {
            if b == 0 {
                return Err(ConstantError::DivisionByZero);
            }
            a.checked_rem(b)
        }
        BinaryOp::ShiftLeft => {
            let amount = u32::try_from(b.rem_euclid(64)).expect("bounded shift");
            a.checked_shl(amount)
        }
        BinaryOp::ShiftRight => {
            let amount = u32::try_from(b.rem_euclid(64)).expect("bounded shift");
            a.checked_shr(amount)
        }
        BinaryOp::And => Some(a & b),
        BinaryOp::Or => Some(a | b),
        BinaryOp::Xor => Some(a ^ b),
        BinaryOp::Equals => return comparison(a == b),
        BinaryOp::NotEquals => return comparison(a != b),
        BinaryOp::Less => return comparison(a < b),
        BinaryOp::LessEquals => return comparison(a <= b),
        BinaryOp::Greater => return comparison(a > b),
        BinaryOp::GreaterEquals => return comparison(a >= b),
        _ => return Err(ConstantError::OperatorNotDefined),
    };
    let value = value.ok_or(ConstantError::NotRepresentable)?;
    let (min, max) = kind.integral_range().expect("integral kind");
    if value < min || value > max {
        return Err(ConstantError::NotRepresentable);
    }
    Ok(ConstantValue::Int { value, kind })
}

#[expect(clippy::float_cmp, reason = "constant folding compares exact values")]
fn fold_float(op: BinaryOp, a: f64, b: f64) -> Result<ConstantValue, ConstantError> {
    let comparison = |result: bool| Ok(ConstantValue::Bool(result));
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::Power => a.powf(b),
        BinaryOp::Modulo => a % b,
        BinaryOp::Equals => return comparison(a == b),
        BinaryOp::NotEquals => return comparison(a != b),
        BinaryOp::Less => return comparison(a < b),
        BinaryOp::LessEquals => return comparison(a <= b),
        BinaryOp::Greater => return comparison(a > b),
        BinaryOp::GreaterEquals => return comparison(a >= b),
        _ => return Err(ConstantError::OperatorNotDefined),
    };
    Ok(ConstantValue::Float {
        value,
        kind: PrimitiveKind::Double,
    })
}

fn fold_decimal(op: BinaryOp, a: Decimal, b: Decimal) -> Result<ConstantValue, ConstantError> {
    let comparison = |result: bool| Ok(ConstantValue::Bool(result));
    let value = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Subtract => a.checked_sub(b),
        BinaryOp::Multiply => a.checked_mul(b),
        BinaryOp::Divide => {
            if b.is_zero() {
                return Err(ConstantError::DivisionByZero);
            }
            a.checked_div(b)
        }
        BinaryOp::Modulo => {
            if b.is_zero() {
                return Err(ConstantError::DivisionByZero);
            }
            a.checked_rem(b)
        }
        BinaryOp::Equals => return comparison(a == b),
        BinaryOp::NotEquals => return comparison(a != b),
        BinaryOp::Less => return comparison(a < b),
        BinaryOp::LessEquals => return comparison(a <= b),
        BinaryOp::Greater => return comparison(a > b),
        BinaryOp::GreaterEquals => return comparison(a >= b),
        _ => return Err(ConstantError::OperatorNotDefined),
    };
    value
        .map(ConstantValue::DecimalValue)
        .ok_or(ConstantError::NotRepresentable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use PrimitiveKind as P;

    fn int(value: i128, kind: P) -> ConstantValue {
        ConstantValue::Int { value, kind }
    }

    #[test]
    fn integral_arithmetic_stays_in_common_type() {
        let result = fold_binary(BinaryOp::Add, &int(1, P::Byte), &int(2, P::Byte)).unwrap();
        assert_eq!(result, int(3, P::Byte));

        let result = fold_binary(BinaryOp::Add, &int(1, P::Byte), &int(2, P::Integer)).unwrap();
        assert_eq!(result, int(3, P::Integer));
    }

    #[test]
    fn integral_overflow_is_not_representable() {
        let result = fold_binary(BinaryOp::Add, &int(255, P::Byte), &int(1, P::Byte));
        assert_eq!(result, Err(ConstantError::NotRepresentable));
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert_eq!(
            fold_binary(BinaryOp::IntDivide, &int(1, P::Integer), &int(0, P::Integer)),
            Err(ConstantError::DivisionByZero)
        );
        assert_eq!(
            fold_binary(BinaryOp::Modulo, &int(1, P::Integer), &int(0, P::Integer)),
            Err(ConstantError::DivisionByZero)
        );
    }

    #[test]
    fn real_division_folds_in_floating_point() {
        let result = fold_binary(BinaryOp::Divide, &int(1, P::Integer), &int(2, P::Integer));
        let Ok(ConstantValue::Float { value, kind }) = result else {
            panic!("expected float, got {result:?}");
        };
        assert_eq!(kind, P::Double);
        assert!((value - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn boolean_logic() {
        let t = ConstantValue::Bool(true);
        let f = ConstantValue::Bool(false);
        assert_eq!(fold_binary(BinaryOp::AndAlso, &t, &f), Ok(f.clone()));
        assert_eq!(fold_binary(BinaryOp::OrElse, &t, &f), Ok(t.clone()));
        assert_eq!(fold_binary(BinaryOp::Xor, &t, &t), Ok(f.clone()));
        assert_eq!(fold_unary(UnaryOp::Not, &t), Ok(f));
    }

    #[test]
    fn bitwise_on_integrals() {
        assert_eq!(
            fold_binary(BinaryOp::And, &int(6, P::Integer), &int(3, P::Integer)),
            Ok(int(2, P::Integer))
        );
        assert_eq!(
            fold_unary(UnaryOp::Not, &int(0, P::Integer)),
            Ok(int(-1, P::Integer))
        );
    }

    #[test]
    fn concatenation_accepts_strings_chars_and_numbers() {
        let result = fold_binary(
            BinaryOp::Concatenate,
            &ConstantValue::Str("v".into()),
            &int(2, P::Integer),
        );
        assert_eq!(result, Ok(ConstantValue::Str("v2".into())));
    }

    #[test]
    fn string_comparisons_are_ordinal() {
        let a = ConstantValue::Str("alpha".into());
        let b = ConstantValue::Str("beta".into());
        assert_eq!(
            fold_binary(BinaryOp::Less, &a, &b),
            Ok(ConstantValue::Bool(true))
        );
        assert_eq!(
            fold_binary(BinaryOp::Equals, &a, &a),
            Ok(ConstantValue::Bool(true))
        );
    }

    #[test]
    fn negating_signed_minimum_promotes() {
        let result = fold_unary(UnaryOp::Minus, &int(i128::from(i32::MIN), P::Integer)).unwrap();
        assert_eq!(result, int(-i128::from(i32::MIN), P::Long));
    }

    #[test]
    fn incompatible_operands_are_rejected() {
        assert_eq!(
            fold_binary(
                BinaryOp::Add,
                &ConstantValue::Str("a".into()),
                &int(1, P::Integer)
            ),
            Err(ConstantError::OperatorNotDefined)
        );
        assert_eq!(
            fold_binary(
                BinaryOp::Subtract,
                &ConstantValue::Date(crate::source_analysis::DateValue::ZERO),
                &int(1, P::Integer)
            ),
            Err(ConstantError::OperatorNotDefined)
        );
    }

    #[test]
    fn decimal_fold() {
        let a = ConstantValue::DecimalValue(Decimal::new(15, 1)); // 1.5
        let b = int(2, P::Integer);
        let result = fold_binary(BinaryOp::Multiply, &a, &b).unwrap();
        assert_eq!(result, ConstantValue::DecimalValue(Decimal::new(30, 1)));
    }
}
