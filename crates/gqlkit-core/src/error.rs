//! Error types for schema composition and request guards.
//!
//! Build-time failures (instantiation, resolver shape, schema sources) abort
//! kit construction. Request-time failures (persisted queries, credit limit)
//! are converted into GraphQL errors carrying an `extensions.code` value.

use async_graphql::{ErrorExtensionValues, ServerError, Value};

/// Errors that can occur while building or guarding a GraphQL schema.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GqlKitError {
    /// The instance resolver could not produce an instance of a type.
    #[error("cannot instantiate {type_name}: {reason}")]
    Instantiation {
        /// Name of the requested type.
        type_name: String,
        /// Why no instance was produced.
        reason: String,
    },

    /// A reflective capability has a parameter list that cannot be adapted.
    #[error("capability `{capability}` has an invalid resolver shape: {reason}")]
    InvalidResolverShape {
        /// Name of the offending capability.
        capability: String,
        /// Description of the rejected shape.
        reason: String,
    },

    /// A persisted-query id is unknown and no query text was supplied.
    #[error("PersistedQueryNotFound")]
    PersistedQueryNotFound {
        /// The requested persisted-query id.
        id: String,
    },

    /// Supplied query text does not hash to the persisted-query id.
    #[error("provided sha does not match query")]
    PersistedQueryHashMismatch {
        /// The requested persisted-query id.
        id: String,
    },

    /// Accumulated field cost exceeded the request budget.
    #[error(
        "Exceeded credit limit for query. Max allowed credits: {limit}. Credits required for query: {used}"
    )]
    CreditLimitExceeded {
        /// Budget of the request.
        limit: u64,
        /// Cost accumulated when execution stopped.
        used: u64,
    },

    /// Reading a schema source failed.
    #[error("failed to read schema source {path}: {message}")]
    SchemaSource {
        /// Path of the file or directory.
        path: String,
        /// Underlying I/O message.
        message: String,
    },

    /// A schema document is not valid SDL.
    #[error("failed to parse schema document {origin}: {message}")]
    SchemaParse {
        /// Origin of the document (file path or inline label).
        origin: String,
        /// Parser message.
        message: String,
    },

    /// The engine rejected the assembled schema.
    #[error("failed to build GraphQL schema: {0}")]
    SchemaBuild(String),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GqlKitError {
    /// Returns the error code for GraphQL error extensions.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Instantiation { .. } => "INSTANTIATION_ERROR",
            Self::InvalidResolverShape { .. } => "INVALID_RESOLVER_SHAPE",
            Self::PersistedQueryNotFound { .. } => "PERSISTED_QUERY_NOT_FOUND",
            Self::PersistedQueryHashMismatch { .. } => "PERSISTED_QUERY_HASH_MISMATCH",
            Self::CreditLimitExceeded { .. } => "EXECUTION_ABORTED",
            Self::SchemaSource { .. } => "SCHEMA_SOURCE_ERROR",
            Self::SchemaParse { .. } => "SCHEMA_PARSE_ERROR",
            Self::SchemaBuild(_) => "SCHEMA_BUILD_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Returns `true` for errors raised while serving a request.
    #[must_use]
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::PersistedQueryNotFound { .. }
                | Self::PersistedQueryHashMismatch { .. }
                | Self::CreditLimitExceeded { .. }
        )
    }

    /// Converts the error into a GraphQL error with `extensions.code` set.
    ///
    /// Credit-limit errors also carry `creditLimit` and `creditsUsed`.
    #[must_use]
    pub fn to_server_error(&self) -> ServerError {
        let mut error = ServerError::new(self.to_string(), None);
        let mut extensions = ErrorExtensionValues::default();
        extensions.set("code", self.error_code());
        if let Self::CreditLimitExceeded { limit, used } = self {
            extensions.set("creditLimit", Value::Number((*limit).into()));
            extensions.set("creditsUsed", Value::Number((*used).into()));
        }
        error.extensions = Some(extensions);
        error
    }
}

impl From<GqlKitError> for ServerError {
    fn from(err: GqlKitError) -> Self {
        err.to_server_error()
    }
}

/// Result type for gqlkit operations.
pub type Result<T> = std::result::Result<T, GqlKitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            GqlKitError::PersistedQueryNotFound { id: "abc".into() }.error_code(),
            "PERSISTED_QUERY_NOT_FOUND"
        );
        assert_eq!(
            GqlKitError::CreditLimitExceeded { limit: 3, used: 4 }.error_code(),
            "EXECUTION_ABORTED"
        );
        assert_eq!(
            GqlKitError::SchemaBuild("boom".into()).error_code(),
            "SCHEMA_BUILD_FAILED"
        );
    }

    #[test]
    fn test_persisted_query_messages() {
        assert_eq!(
            GqlKitError::PersistedQueryNotFound { id: "x".into() }.to_string(),
            "PersistedQueryNotFound"
        );
        assert_eq!(
            GqlKitError::PersistedQueryHashMismatch { id: "x".into() }.to_string(),
            "provided sha does not match query"
        );
    }

    #[test]
    fn test_credit_limit_message() {
        let err = GqlKitError::CreditLimitExceeded { limit: 3, used: 4 };
        assert_eq!(
            err.to_string(),
            "Exceeded credit limit for query. Max allowed credits: 3. Credits required for query: 4"
        );
    }

    #[test]
    fn test_server_error_extensions() {
        let err = GqlKitError::CreditLimitExceeded { limit: 3, used: 4 }.to_server_error();
        let extensions = err.extensions.expect("extensions set");
        assert_eq!(
            extensions.get("code"),
            Some(&Value::String("EXECUTION_ABORTED".into()))
        );
        assert_eq!(extensions.get("creditLimit"), Some(&Value::Number(3.into())));
        assert_eq!(extensions.get("creditsUsed"), Some(&Value::Number(4.into())));
    }

    #[test]
    fn test_question_mark_converts_to_field_error() {
        fn resolve() -> async_graphql::Result<()> {
            Err(GqlKitError::SchemaBuild("boom".into()))?;
            Ok(())
        }
        let err = resolve().unwrap_err();
        assert_eq!(err.message, "failed to build GraphQL schema: boom");
    }

    #[test]
    fn test_request_errors() {
        assert!(GqlKitError::PersistedQueryNotFound { id: "a".into() }.is_request_error());
        assert!(!GqlKitError::Config("bad".into()).is_request_error());
    }
}
