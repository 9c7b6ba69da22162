//! Error type shared by all ridgedb crates.
//!
//! Every error carries a stable [`ErrorKind`] so that callers (and the client
//! surface) can match on the condition without parsing messages.
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Stable classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// ALTER SEQUENCE targets a column without an associated sequence.
    SequenceNotFound,
    /// Sequence increment evaluated to zero.
    InvalidIncrement,
    /// Principal lacks the required right on an object.
    PermissionDenied,
    /// Id requested on a named savepoint.
    SavepointNamed,
    /// Name requested on an anonymous savepoint.
    SavepointUnnamed,
    /// Savepoint was released, rolled back past, or belongs to a finished
    /// transaction.
    SavepointInvalid,
    /// Query statement executed through an update entry point.
    MethodNotAllowedForQuery,
    /// Non-query statement executed through a query entry point.
    MethodOnlyAllowedForQuery,
    /// Operation on a closed cursor, statement, or session.
    ObjectClosed,
    /// Out of range value.
    InvalidValue,
    /// Expression evaluation failed.
    EvaluationError,
    /// A positional parameter was not bound.
    ParameterNotSet,
    /// Wrong number of arguments for a prepared procedure.
    ParameterCountMismatch,
    /// No procedure registered under the name.
    ProcedureNotFound,
    /// Missing catalog object.
    ObjectNotFound,
    /// Catalog object with the same name already exists.
    DuplicateObject,
    /// Unique key violation.
    DuplicateKey,
    /// Operation not valid in the current state.
    InvalidState,
    /// Statement canceled or timed out.
    StatementCanceled,
    NotImplemented,
    Internal,
}

impl ErrorKind {
    /// Vendor error code for this kind.
    pub const fn code(&self) -> u32 {
        match self {
            Self::SequenceNotFound => 90036,
            Self::InvalidIncrement => 90008,
            Self::PermissionDenied => 90096,
            Self::SavepointNamed => 90065,
            Self::SavepointUnnamed => 90064,
            Self::SavepointInvalid => 90063,
            Self::MethodNotAllowedForQuery => 90001,
            Self::MethodOnlyAllowedForQuery => 90002,
            Self::ObjectClosed => 90007,
            Self::InvalidValue => 90008,
            Self::EvaluationError => 22018,
            Self::ParameterNotSet => 90012,
            Self::ParameterCountMismatch => 7001,
            Self::ProcedureNotFound => 90022,
            Self::ObjectNotFound => 42102,
            Self::DuplicateObject => 42101,
            Self::DuplicateKey => 23505,
            Self::InvalidState => 90030,
            Self::StatementCanceled => 57014,
            Self::NotImplemented => 50100,
            Self::Internal => 50000,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SequenceNotFound => "sequence not found",
            Self::InvalidIncrement => "invalid increment",
            Self::PermissionDenied => "permission denied",
            Self::SavepointNamed => "savepoint is named",
            Self::SavepointUnnamed => "savepoint is unnamed",
            Self::SavepointInvalid => "savepoint is invalid",
            Self::MethodNotAllowedForQuery => "method not allowed for query",
            Self::MethodOnlyAllowedForQuery => "method only allowed for query",
            Self::ObjectClosed => "object closed",
            Self::InvalidValue => "invalid value",
            Self::EvaluationError => "evaluation error",
            Self::ParameterNotSet => "parameter not set",
            Self::ParameterCountMismatch => "parameter count mismatch",
            Self::ProcedureNotFound => "procedure not found",
            Self::ObjectNotFound => "object not found",
            Self::DuplicateObject => "duplicate object",
            Self::DuplicateKey => "duplicate key",
            Self::InvalidState => "invalid state",
            Self::StatementCanceled => "statement canceled",
            Self::NotImplemented => "not implemented",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

pub struct DbError {
    inner: Box<DbErrorInner>,
}

struct DbErrorInner {
    kind: ErrorKind,
    msg: String,
    fields: Vec<(String, String)>,
    source: Option<Box<dyn Error + Send + Sync>>,
    backtrace: Backtrace,
}

impl DbError {
    /// Create a new internal error.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::new_kind(ErrorKind::Internal, msg)
    }

    /// Create a new error with an explicit kind.
    pub fn new_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        DbError {
            inner: Box::new(DbErrorInner {
                kind,
                msg: msg.into(),
                fields: Vec::new(),
                source: None,
                backtrace: Backtrace::capture(),
            }),
        }
    }

    /// Wrap a source error.
    ///
    /// If the source is itself a `DbError`, its kind is preserved.
    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let kind = source
            .downcast_ref::<DbError>()
            .map(|e| e.kind())
            .unwrap_or(ErrorKind::Internal);

        let mut err = Self::new_kind(kind, msg);
        err.inner.source = Some(source);
        err
    }

    /// Attach a named field providing context for the error.
    pub fn with_field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.inner.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn with_fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        for (key, value) in fields {
            self.inner.fields.push((key.into(), value.to_string()));
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn code(&self) -> u32 {
        self.inner.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.inner.msg
    }

    /// Get the value of a field attached with `with_field`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;

        if !self.inner.fields.is_empty() {
            write!(f, " [")?;
            for (idx, (key, value)) in self.inner.fields.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}: {value}")?;
            }
            write!(f, "]")?;
        }

        write!(f, " ({})", self.inner.kind.code())?;

        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }

        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\nBacktrace:\n{}", self.inner.backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbError")
            .field("kind", &self.inner.kind)
            .field("msg", &self.inner.msg)
            .field("fields", &self.inner.fields)
            .field("source", &self.inner.source)
            .finish()
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Add context to errors.
pub trait ResultExt<T, E> {
    /// Wrap the error with a static message.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Wrap the error with a lazily built message.
    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| DbError::with_source(msg, Box::new(e)))
    }

    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| DbError::with_source(f(), Box::new(e)))
    }
}

pub trait OptionExt<T> {
    /// Return an internal error if the option is None.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        self.ok_or_else(|| DbError::new(format!("Missing required value: {msg}")))
    }
}

#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)*) => {
        $crate::DbError::new_kind(
            $crate::ErrorKind::NotImplemented,
            format!("Not yet implemented: {}", std::format!($($arg)*)),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_fields_and_code() {
        let err = DbError::new_kind(ErrorKind::InvalidValue, "Invalid value")
            .with_field("value", -1)
            .with_field("setting", "query_timeout");

        let s = err.to_string();
        assert!(s.starts_with("Invalid value [value: -1, setting: query_timeout] (90008)"));
        assert_eq!(Some("-1"), err.field("value"));
        assert_eq!(None, err.field("missing"));
    }

    #[test]
    fn context_preserves_kind() {
        let res: Result<()> = Err(DbError::new_kind(ErrorKind::ObjectClosed, "closed"));
        let err = res.context("Failed to advance cursor").unwrap_err();

        assert_eq!(ErrorKind::ObjectClosed, err.kind());
        assert_eq!("Failed to advance cursor", err.message());
        assert!(err.source().is_some());
    }

    #[test]
    fn context_on_foreign_error_is_internal() {
        let res: std::result::Result<i64, _> = "abc".parse::<i64>();
        let err = res.context_fn(|| "parse 'abc'".to_string()).unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
    }

    #[test]
    fn required_none() {
        let err = None::<u32>.required("table").unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
        assert_eq!(Some(3), Some(3).required("x").ok());
    }

    #[test]
    fn not_implemented_macro() {
        let err = not_implemented!("cursor direction {}", "reverse");
        assert_eq!(ErrorKind::NotImplemented, err.kind());
        assert_eq!("Not yet implemented: cursor direction reverse", err.message());
    }
}
