use std::fmt::Debug;

use ridgedb_error::{DbError, ErrorKind, Result};

use super::Expression;
use crate::catalog::system_session::SystemSession;
use crate::scalar::{DataType, ScalarValue};

/// State an expression can read or update while being evaluated.
#[derive(Debug)]
pub struct EvalContext<'a> {
    /// Used to persist sequence reservations.
    pub system: &'a SystemSession,
    pub parameters: &'a [ScalarValue],
    /// Session's last drawn sequence value.
    pub last_identity: &'a mut Option<i64>,
    /// Last sequence value drawn since this was reset.
    pub drawn: Option<i64>,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        system: &'a SystemSession,
        parameters: &'a [ScalarValue],
        last_identity: &'a mut Option<i64>,
    ) -> Self {
        EvalContext {
            system,
            parameters,
            last_identity,
            drawn: None,
        }
    }

    pub fn parameter(&self, idx: usize) -> Result<&ScalarValue> {
        self.parameters.get(idx).ok_or_else(|| {
            DbError::new_kind(ErrorKind::ParameterNotSet, "Parameter not set")
                .with_field("parameter", format!("#{}", idx + 1))
        })
    }
}

/// Evaluates bound expressions to a scalar.
pub trait ExpressionEvaluator: Debug + Sync + Send {
    fn evaluate(&self, expr: &Expression, ctx: &mut EvalContext<'_>) -> Result<ScalarValue>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEvaluator;

impl ExpressionEvaluator for DefaultEvaluator {
    fn evaluate(&self, expr: &Expression, ctx: &mut EvalContext<'_>) -> Result<ScalarValue> {
        match expr {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Parameter(idx) => ctx.parameter(*idx).cloned(),
            Expression::NextValue(seq) => {
                let v = seq.next_value(ctx.system)?;
                *ctx.last_identity = Some(v);
                ctx.drawn = Some(v);
                Ok(ScalarValue::Int64(v))
            }
            Expression::CurrentValue(seq) => Ok(ScalarValue::Int64(seq.current_value())),
            Expression::Identity => Ok(match ctx.last_identity {
                Some(v) => ScalarValue::Int64(*v),
                None => ScalarValue::Null,
            }),
            Expression::Negate(e) => match self.evaluate(e, ctx)? {
                ScalarValue::Null => Ok(ScalarValue::Null),
                ScalarValue::Int32(v) => v.checked_neg().map(ScalarValue::Int32).ok_or_else(overflow),
                ScalarValue::Int64(v) => v.checked_neg().map(ScalarValue::Int64).ok_or_else(overflow),
                other => Err(type_mismatch("-", &other)),
            },
            Expression::Add(l, r) => {
                let left = self.evaluate(l, ctx)?;
                let right = self.evaluate(r, ctx)?;
                add(&left, &right)
            }
            Expression::CastToBigint(e) => self.evaluate(e, ctx)?.cast_to(DataType::Int64),
        }
    }
}

fn add(left: &ScalarValue, right: &ScalarValue) -> Result<ScalarValue> {
    match (left, right) {
        (ScalarValue::Null, _) | (_, ScalarValue::Null) => Ok(ScalarValue::Null),
        (ScalarValue::Int32(l), ScalarValue::Int32(r)) => {
            l.checked_add(*r).map(ScalarValue::Int32).ok_or_else(overflow)
        }
        (ScalarValue::Int32(_) | ScalarValue::Int64(_), ScalarValue::Int32(_) | ScalarValue::Int64(_)) => {
            left.try_as_i64()?
                .checked_add(right.try_as_i64()?)
                .map(ScalarValue::Int64)
                .ok_or_else(overflow)
        }
        (ScalarValue::Int32(_) | ScalarValue::Int64(_), other) | (other, _) => {
            Err(type_mismatch("+", other))
        }
    }
}

fn overflow() -> DbError {
    DbError::new_kind(ErrorKind::EvaluationError, "Numeric value out of range")
}

fn type_mismatch(op: &str, value: &ScalarValue) -> DbError {
    DbError::new_kind(ErrorKind::EvaluationError, "Data conversion error")
        .with_field("operator", op)
        .with_field("value", value)
        .with_field("type", value.datatype())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::ObjectKey;
    use crate::catalog::sequence::Sequence;

    fn eval(expr: &Expression, params: &[ScalarValue]) -> Result<ScalarValue> {
        let sys = SystemSession::default();
        let mut last = None;
        let mut ctx = EvalContext::new(&sys, params, &mut last);
        DefaultEvaluator.evaluate(expr, &mut ctx)
    }

    #[test]
    fn arithmetic() {
        let expr = Expression::add(Expression::lit(2), Expression::negate(Expression::param(0)));
        assert_eq!(ScalarValue::Int32(-1), eval(&expr, &[3.into()]).unwrap());

        let expr = Expression::add(Expression::lit(2), Expression::lit(3_i64));
        assert_eq!(ScalarValue::Int64(5), eval(&expr, &[]).unwrap());

        let expr = Expression::add(Expression::lit(i32::MAX), Expression::lit(1));
        assert_eq!(ErrorKind::EvaluationError, eval(&expr, &[]).unwrap_err().kind());

        let expr = Expression::add(Expression::lit("a"), Expression::lit(1));
        assert_eq!(ErrorKind::EvaluationError, eval(&expr, &[]).unwrap_err().kind());
    }

    #[test]
    fn null_propagates() {
        let expr = Expression::add(Expression::lit(ScalarValue::Null), Expression::lit(1));
        assert_eq!(ScalarValue::Null, eval(&expr, &[]).unwrap());
    }

    #[test]
    fn missing_parameter() {
        let err = eval(&Expression::param(1), &[1.into()]).unwrap_err();
        assert_eq!(ErrorKind::ParameterNotSet, err.kind());
        assert_eq!(Some("#2"), err.field("parameter"));
    }

    #[test]
    fn cast_to_bigint() {
        let expr = Expression::cast_to_bigint(Expression::lit("42"));
        assert_eq!(ScalarValue::Int64(42), eval(&expr, &[]).unwrap());
    }

    #[test]
    fn next_value_tracks_identity() {
        let sys = SystemSession::default();
        let seq = Arc::new(
            Sequence::try_new(ObjectKey::new("PUBLIC", "SEQ"), 1, 1, 32, false).unwrap(),
        );
        let mut last = None;
        let mut ctx = EvalContext::new(&sys, &[], &mut last);

        assert_eq!(ScalarValue::Null, DefaultEvaluator.evaluate(&Expression::Identity, &mut ctx).unwrap());
        DefaultEvaluator.evaluate(&Expression::next_value(&seq), &mut ctx).unwrap();
        let v = DefaultEvaluator.evaluate(&Expression::next_value(&seq), &mut ctx).unwrap();
        assert_eq!(ScalarValue::Int64(2), v);
        assert_eq!(Some(2), ctx.drawn);
        assert_eq!(
            ScalarValue::Int64(2),
            DefaultEvaluator.evaluate(&Expression::Identity, &mut ctx).unwrap()
        );
        assert_eq!(
            ScalarValue::Int64(2),
            DefaultEvaluator.evaluate(&Expression::current_value(&seq), &mut ctx).unwrap()
        );
        drop(ctx);
        assert_eq!(Some(2), last);
    }
}
