//! Error types for sqlexpr

use thiserror::Error;

/// The result type for sqlexpr operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, compiling or evaluating expressions.
///
/// Every error is terminal for the compile call that produced it: no partial
/// SQL or predicate is ever returned.
#[derive(Debug, Error)]
pub enum Error {
    /// A node has no registered rule, or its payload cannot be compiled
    #[error("Compile error: {0}")]
    Compile(String),

    /// A statement needs a table and none of explicit, inferred or default is available
    #[error("No table: {0}")]
    NoTable(String),

    /// An expression was constructed with inconsistent arguments
    #[error("Expression error: {0}")]
    Expression(String),

    /// The predicate compiler has no support for a construct
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A compiled predicate failed while evaluating against a row
    #[error("Evaluation error: {0}")]
    Evaluate(String),

    /// Internal error (should not happen in normal usage)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a compile error
    pub fn compile(message: impl Into<String>) -> Self {
        Error::Compile(message.into())
    }

    /// Create a missing table error
    pub fn no_table(message: impl Into<String>) -> Self {
        Error::NoTable(message.into())
    }

    /// Create an expression construction error
    pub fn expression(message: impl Into<String>) -> Self {
        Error::Expression(message.into())
    }

    /// Create an unsupported construct error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported(message.into())
    }

    /// Create an evaluation error
    pub fn evaluate(message: impl Into<String>) -> Self {
        Error::Evaluate(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_category() {
        assert_eq!(
            Error::no_table("Couldn't find any table").to_string(),
            "No table: Couldn't find any table"
        );
        assert_eq!(
            Error::compile("Don't know how to compile type Raw").to_string(),
            "Compile error: Don't know how to compile type Raw"
        );
    }
}
