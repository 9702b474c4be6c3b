//! Error types.

use core::fmt;

use crate::{expectation::VerificationError, registry::FunctionKey};

/// Coarse classification of [`Error`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed input to a public operation.
    InvalidArgument,
    /// Attempt to install an interceptor where one cannot be installed.
    Conflict,
    /// Lookup of a target that is absent or has a different signature.
    Lookup,
    /// Mock expectations were not met.
    Verification,
}

/// Errors produced by the registry, the generator and the [`Environment`](crate::Environment).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input.
    #[error("{reason}")]
    InvalidArgument {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Human-readable description of the problem.
        reason: String,
    },
    /// The namespace already owns an ordinary function with this name.
    #[error(
        "The function `{}` in the namespace `{}` has already been defined by a user",
        .key.name(),
        .key.namespace()
    )]
    DefinedByUser {
        /// Conflicting function.
        key: FunctionKey,
    },
    /// An interceptor was already generated for this function.
    #[error(
        "The function `{}` in the namespace `{}` has been already mocked",
        .key.name(),
        .key.namespace()
    )]
    AlreadyMocked {
        /// Conflicting function.
        key: FunctionKey,
    },
    /// No target is registered for the function.
    #[error("Invalid identifier `{key}` given. Cannot find a target related to it.")]
    NotFound {
        /// Requested function.
        key: FunctionKey,
    },
    /// The target is registered, but with a different signature.
    #[error("target for `{key}` has signature `{actual}`, while `{expected}` was requested")]
    SignatureMismatch {
        /// Requested function.
        key: FunctionKey,
        /// Requested signature.
        expected: &'static str,
        /// Signature of the registered target.
        actual: &'static str,
    },
    /// One or more mocks failed verification during cleanup.
    #[error("{} mock(s) failed verification: {}", .failures.len(), join(.failures))]
    Verification {
        /// Verification failures in the order the mocks were created.
        failures: Vec<VerificationError>,
    },
}

fn join(failures: &[VerificationError]) -> String {
    let messages: Vec<_> = failures.iter().map(ToString::to_string).collect();
    messages.join("; ")
}

impl Error {
    pub(crate) fn invalid_argument(parameter: &'static str, reason: impl fmt::Display) -> Self {
        Self::InvalidArgument {
            parameter,
            reason: reason.to_string(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::DefinedByUser { .. } | Self::AlreadyMocked { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } | Self::SignatureMismatch { .. } => ErrorKind::Lookup,
            Self::Verification { .. } => ErrorKind::Verification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_messages_name_function_and_namespace() {
        let key = FunctionKey::new("Fumo::Tests", "mail");
        let err = Error::DefinedByUser { key: key.clone() };
        assert_eq!(
            err.to_string(),
            "The function `mail` in the namespace `Fumo::Tests` has already been defined by a user"
        );
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = Error::AlreadyMocked { key };
        assert!(err.to_string().ends_with("has been already mocked"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn lookup_message_names_key() {
        let err = Error::NotFound {
            key: FunctionKey::new("app", "now"),
        };
        assert_eq!(
            err.to_string(),
            "Invalid identifier `app::now` given. Cannot find a target related to it."
        );
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn invalid_argument_keeps_parameter() {
        let err = Error::invalid_argument("namespace", "Given namespace is empty");
        assert_eq!(err.to_string(), "Given namespace is empty");
        assert!(matches!(
            err,
            Error::InvalidArgument {
                parameter: "namespace",
                ..
            }
        ));
    }
}
