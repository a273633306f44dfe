//! Query compilation error types.

use thiserror::Error;

/// A query expression that cannot be turned into qastle.
///
/// Always raised before any network activity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilationError {
    /// Lambda text could not be parsed.
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// A query operator was handed something other than a lambda.
    #[error("Expected a lambda for '{operator}'")]
    ExpectedLambda { operator: String },

    /// The root of the query is not a call.
    #[error("Query root must be a call expression")]
    NotACall,

    /// A terminal call is missing a required argument.
    #[error("'{terminal}' expects at least {expected} argument(s), got {found}")]
    MissingArgument {
        terminal: String,
        expected: usize,
        found: usize,
    },

    /// The column-name argument is not a list of strings or a string.
    #[error("Column names for '{terminal}' must be a list of strings or a string")]
    InvalidColumnNames { terminal: String },

    /// Several column names against a stream that yields a single value.
    #[error("{count} column names given but the query does not build a tuple")]
    AmbiguousColumns { count: usize },

    /// More column names than values in the tuple the query builds.
    #[error("{names} column names given for a tuple of {width} values")]
    ColumnCountMismatch { names: usize, width: usize },

    /// The backend cannot produce any format a local materializer can read.
    #[error("Code generator '{codegen}' supports none of the requested result formats")]
    NoSupportedFormat { codegen: String },
}
