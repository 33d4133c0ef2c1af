//! Error types and result definitions for harness operations.
//!
//! Provides a single error type with classification and captured callsite
//! metadata. [`TestkitError`] carries an [`ErrorKind`], a static description,
//! optional dynamic detail, and an optional source error.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use testkit_config::shared::HarnessConfigError;
use testkit_postgres::error::NodeError;

/// Convenient result type for harness operations using [`TestkitError`] as the error type.
pub type TestkitResult<T> = Result<T, TestkitError>;

/// Main error type for harness operations.
#[derive(Debug, Clone)]
pub struct TestkitError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Specific categories of errors that can occur during harness operations.
///
/// Error kinds are organized by functional area and failure mode to enable
/// appropriate handling strategies in tests.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Backup & Provisioning Errors
    BackupFailed,
    ProvisionFailed,

    // Node & Connection Errors
    NodeFailure,
    SourceConnectionFailed,
    SourceQueryFailed,

    // Configuration & IO Errors
    ConfigError,
    IoError,

    // State & Workflow Errors
    InvalidState,
    BackgroundTaskFailed,

    // Unknown / Uncategorized
    Unknown,
}

impl TestkitError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// The stored source is preserved across clones and exposed via [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`TestkitError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        TestkitError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
        }
    }
}

impl PartialEq for TestkitError {
    fn eq(&self, other: &TestkitError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for TestkitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = self.detail.as_deref() {
            write!(f, "\n  Detail: {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for TestkitError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

/// Creates a [`TestkitError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for TestkitError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> TestkitError {
        TestkitError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`TestkitError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for TestkitError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> TestkitError {
        TestkitError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`TestkitError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for TestkitError {
    #[track_caller]
    fn from(err: std::io::Error) -> TestkitError {
        let detail = err.to_string();
        let source = Arc::new(err);
        TestkitError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`tokio_postgres::Error`] to [`TestkitError`] with the appropriate error kind.
///
/// Maps errors based on Postgres SQLSTATE codes; states the harness does not
/// distinguish fall through to [`ErrorKind::SourceQueryFailed`].
impl From<tokio_postgres::Error> for TestkitError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> TestkitError {
        let (kind, description) = match err.code() {
            Some(sqlstate) => {
                use tokio_postgres::error::SqlState;

                match *sqlstate {
                    // Connection errors (08xxx)
                    SqlState::CONNECTION_EXCEPTION
                    | SqlState::CONNECTION_DOES_NOT_EXIST
                    | SqlState::CONNECTION_FAILURE
                    | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                    | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION => (
                        ErrorKind::SourceConnectionFailed,
                        "Postgres connection failed",
                    ),

                    // Authentication errors (28xxx)
                    SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                        ErrorKind::SourceConnectionFailed,
                        "Postgres authentication failed",
                    ),

                    // Server availability errors (57xxx)
                    SqlState::ADMIN_SHUTDOWN
                    | SqlState::CRASH_SHUTDOWN
                    | SqlState::CANNOT_CONNECT_NOW => {
                        (ErrorKind::SourceConnectionFailed, "Postgres unavailable")
                    }

                    // Object state errors (55xxx), e.g. ending a backup that never began
                    SqlState::OBJECT_NOT_IN_PREREQUISITE_STATE => (
                        ErrorKind::InvalidState,
                        "Postgres object not in prerequisite state",
                    ),

                    // Default for other SQL states
                    _ => (ErrorKind::SourceQueryFailed, "Postgres query failed"),
                }
            }
            // No SQL state means connection issue
            None => (
                ErrorKind::SourceConnectionFailed,
                "Postgres connection failed",
            ),
        };

        let detail = err.to_string();
        let source = Arc::new(err);
        TestkitError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`NodeError`] to [`TestkitError`] with the appropriate error kind.
impl From<NodeError> for TestkitError {
    #[track_caller]
    fn from(err: NodeError) -> TestkitError {
        match err {
            NodeError::Query(err) => err.into(),
            NodeError::Io { .. } => {
                let detail = err.to_string();
                TestkitError::from_components(
                    ErrorKind::IoError,
                    Cow::Borrowed("Node filesystem operation failed"),
                    Some(Cow::Owned(detail)),
                    Some(Arc::new(err)),
                )
            }
            NodeError::InvalidState { .. } => {
                let detail = err.to_string();
                TestkitError::from_components(
                    ErrorKind::InvalidState,
                    Cow::Borrowed("Node is in the wrong state"),
                    Some(Cow::Owned(detail)),
                    Some(Arc::new(err)),
                )
            }
            NodeError::Launch { .. }
            | NodeError::CommandFailed { .. }
            | NodeError::UnexpectedResult { .. } => {
                let detail = err.to_string();
                TestkitError::from_components(
                    ErrorKind::NodeFailure,
                    Cow::Borrowed("Node operation failed"),
                    Some(Cow::Owned(detail)),
                    Some(Arc::new(err)),
                )
            }
        }
    }
}

/// Converts [`HarnessConfigError`] to [`TestkitError`] with [`ErrorKind::ConfigError`].
impl From<HarnessConfigError> for TestkitError {
    #[track_caller]
    fn from(err: HarnessConfigError) -> TestkitError {
        let detail = err.to_string();
        let source = Arc::new(err);
        TestkitError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Harness configuration is invalid"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit_error;

    #[test]
    fn test_error_carries_kind_and_detail() {
        let error = testkit_error!(
            ErrorKind::ProvisionFailed,
            "Backup tree is malformed",
            "missing data directory"
        );

        assert_eq!(error.kind(), ErrorKind::ProvisionFailed);
        assert_eq!(error.detail(), Some("missing data directory"));
    }

    #[test]
    fn test_display_includes_location() {
        let error = testkit_error!(ErrorKind::BackupFailed, "Backup bracket failed");
        let rendered = error.to_string();

        assert!(rendered.contains("BackupFailed"));
        assert!(rendered.contains("Backup bracket failed"));
        assert!(rendered.contains("error.rs"));
    }

    #[test]
    fn test_errors_compare_by_kind() {
        let first = testkit_error!(ErrorKind::IoError, "one");
        let second = testkit_error!(ErrorKind::IoError, "two");
        let third = testkit_error!(ErrorKind::Unknown, "one");

        assert_eq!(first, second);
        assert_ne!(first, third);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: TestkitError = io_error.into();

        assert_eq!(error.kind(), ErrorKind::IoError);
        assert!(std::error::Error::source(&error).is_some());
    }
}
