use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Return a "not yet implemented" error from the current function.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)*) => {
        return Err($crate::DbError::new(format!("Not yet implemented: {}", format!($($arg)*))))
    };
}

/// Broad category of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The statement itself is illegal or unsupported.
    ///
    /// Callers report these and abandon compiling the statement.
    Planning,
    /// Some upstream contract was broken. Not meant to be recovered from.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planning => write!(f, "Planning"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

#[derive(Debug)]
pub struct DbError {
    inner: Box<DbErrorInner>,
}

#[derive(Debug)]
struct DbErrorInner {
    msg: String,
    kind: ErrorKind,
    fields: Vec<(String, String)>,
    source: Option<Box<dyn Error + Send + Sync>>,
    backtrace: Backtrace,
}

impl DbError {
    /// Create a new internal error.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    /// Create a new user-facing planning error.
    pub fn planning(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Planning, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        DbError {
            inner: Box::new(DbErrorInner {
                msg: msg.into(),
                kind,
                fields: Vec::new(),
                source: None,
                backtrace: Backtrace::capture(),
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    /// Attach an additional key/value pair to the error.
    pub fn with_field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.inner.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn get_msg(&self) -> &str {
        &self.inner.msg
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn is_planning_error(&self) -> bool {
        self.inner.kind == ErrorKind::Planning
    }

    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;
        for (key, value) in &self.inner.fields {
            write!(f, "\n  {key}: {value}")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }
        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\nBacktrace: {}", self.inner.backtrace)?;
        }
        Ok(())
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<fmt::Error> for DbError {
    fn from(value: fmt::Error) -> Self {
        DbError::with_source("Format error", Box::new(value))
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        DbError::with_source("IO error", Box::new(value))
    }
}

impl From<std::num::ParseIntError> for DbError {
    fn from(value: std::num::ParseIntError) -> Self {
        DbError::with_source("Parse int error", Box::new(value))
    }
}

impl From<std::str::ParseBoolError> for DbError {
    fn from(value: std::str::ParseBoolError) -> Self {
        DbError::with_source("Parse bool error", Box::new(value))
    }
}

/// Wrap foreign errors with some context.
pub trait ResultExt<T, E> {
    fn context(self, msg: &'static str) -> Result<T>;
    fn context_fn<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| DbError::with_source(msg, Box::new(e)))
    }

    fn context_fn<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| DbError::with_source(f(), Box::new(e)))
    }
}

pub trait OptionExt<T> {
    /// Return an internal error if the option is `None`.
    fn required(self, what: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, what: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(DbError::new(format!("Missing required value: {what}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unimplemented_thing() -> Result<()> {
        not_implemented!("multi-table {}", "DISTINCT")
    }

    #[test]
    fn planning_kind() {
        let err = DbError::planning("bad statement");
        assert!(err.is_planning_error());
        assert_eq!(ErrorKind::Planning, err.kind());
        assert_eq!("bad statement", err.get_msg());
    }

    #[test]
    fn new_is_internal() {
        let err = DbError::new("oops");
        assert!(!err.is_planning_error());
    }

    #[test]
    fn fields_in_display() {
        let err = DbError::planning("mismatch")
            .with_field("table", "t")
            .with_field("count", 3);
        assert_eq!(Some("3"), err.get_field("count"));

        let s = err.to_string();
        assert!(s.starts_with("mismatch\n  table: t\n  count: 3"));
    }

    #[test]
    fn required_none() {
        let err = None::<i32>.required("sub-plan source").unwrap_err();
        assert_eq!("Missing required value: sub-plan source", err.get_msg());
    }

    #[test]
    fn not_implemented_macro() {
        let err = unimplemented_thing().unwrap_err();
        assert_eq!("Not yet implemented: multi-table DISTINCT", err.get_msg());
    }

    #[test]
    fn context_wraps_source() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("disk gone"));
        let err = res.context("reading catalog").unwrap_err();
        assert_eq!("reading catalog", err.get_msg());
        assert!(err.source().is_some());
    }
}
