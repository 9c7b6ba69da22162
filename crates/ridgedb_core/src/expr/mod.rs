//! Bound expressions and the evaluator seam.
pub mod evaluator;

use std::fmt;
use std::sync::Arc;

use crate::catalog::sequence::Sequence;
use crate::scalar::ScalarValue;

/// An expression already bound to catalog objects.
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(ScalarValue),
    /// Positional parameter, zero based.
    Parameter(usize),
    NextValue(Arc<Sequence>),
    CurrentValue(Arc<Sequence>),
    /// Last value this session drew from any sequence.
    Identity,
    Negate(Box<Expression>),
    Add(Box<Expression>, Box<Expression>),
    CastToBigint(Box<Expression>),
}

impl Expression {
    pub fn lit(value: impl Into<ScalarValue>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn param(idx: usize) -> Self {
        Expression::Parameter(idx)
    }

    pub fn next_value(seq: &Arc<Sequence>) -> Self {
        Expression::NextValue(seq.clone())
    }

    pub fn current_value(seq: &Arc<Sequence>) -> Self {
        Expression::CurrentValue(seq.clone())
    }

    pub fn negate(expr: Expression) -> Self {
        Expression::Negate(Box::new(expr))
    }

    pub fn add(left: Expression, right: Expression) -> Self {
        Expression::Add(Box::new(left), Box::new(right))
    }

    pub fn cast_to_bigint(expr: Expression) -> Self {
        Expression::CastToBigint(Box::new(expr))
    }

    /// Number of parameter slots this expression needs, the highest parameter
    /// index plus one.
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Parameter(idx) => idx + 1,
            Self::Negate(e) | Self::CastToBigint(e) => e.parameter_count(),
            Self::Add(l, r) => l.parameter_count().max(r.parameter_count()),
            Self::Literal(_) | Self::NextValue(_) | Self::CurrentValue(_) | Self::Identity => 0,
        }
    }
}

/// Parameter slots needed by a set of expressions.
pub fn parameter_count<'a>(exprs: impl IntoIterator<Item = &'a Expression>) -> usize {
    exprs
        .into_iter()
        .map(Expression::parameter_count)
        .max()
        .unwrap_or(0)
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Parameter(idx) => write!(f, "?{}", idx + 1),
            Self::NextValue(seq) => write!(f, "NEXT VALUE FOR {}", seq.key()),
            Self::CurrentValue(seq) => write!(f, "CURRENT VALUE FOR {}", seq.key()),
            Self::Identity => write!(f, "IDENTITY()"),
            Self::Negate(e) => write!(f, "-({e})"),
            Self::Add(l, r) => write!(f, "({l} + {r})"),
            Self::CastToBigint(e) => write!(f, "CAST({e} AS BIGINT)"),
        }
    }
}
