use std::fmt::Display;

/// EmberDB errors.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// begin was called while a transaction is already active. A client
    /// holds at most one transaction at a time.
    ExistingTransaction,
    /// A transactional operation was called with no active transaction.
    NoTransaction,
    /// create_table was called for a table the transaction already knows,
    /// either from its snapshot or from its own pending actions.
    TableExists(String),
    /// write_row was called against a table unknown to the transaction.
    NoSuchTable(String),
    /// Another writer claimed this transaction's log slot. The transaction
    /// is consumed; begin a new one and retry.
    CommitConflict,
    /// put_if_absent target name already exists in the object store.
    AlreadyExists(String),
    /// The object store does not hold the requested name.
    NotFound(String),
    /// A committed manifest could not be decoded. Fatal to the transaction
    /// and to the database as currently read.
    CorruptLog(String),
    /// Invalid data, typically decoding errors outside the log.
    InvalidData(String),
    /// Invalid user input.
    InvalidInput(String),
    /// An IO error.
    IO(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::ExistingTransaction => write!(f, "existing transaction"),
            Error::NoTransaction => write!(f, "no active transaction"),
            Error::TableExists(name) => write!(f, "table {name} already exists"),
            Error::NoSuchTable(name) => write!(f, "no such table {name}"),
            Error::CommitConflict => write!(f, "commit conflict, retry transaction"),
            Error::AlreadyExists(name) => write!(f, "object {name} already exists"),
            Error::NotFound(name) => write!(f, "object {name} not found"),
            Error::CorruptLog(msg) => write!(f, "corrupt log: {msg}"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::IO(msg) => write!(f, "io error: {msg}"),
        }
    }
}

/// Constructs an Error::InvalidData for the given format string.
#[macro_export]
macro_rules! errdata {
    ($($args:tt)*) => { $crate::error::Error::InvalidData(format!($($args)*)).into() };
}

/// Constructs an Error::InvalidInput for the given format string.
#[macro_export]
macro_rules! errinput {
    ($($args:tt)*) => { $crate::error::Error::InvalidInput(format!($($args)*)).into() };
}

/// An EmberDB Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(error: Error) -> Self {
        Err(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::IO(err.to_string())
    }
}
