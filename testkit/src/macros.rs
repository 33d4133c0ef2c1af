//! Macros for harness error handling.
//!
//! Provides convenience macros for creating and returning
//! [`crate::error::TestkitError`] instances with reduced boilerplate.

/// Creates a [`crate::error::TestkitError`] from error kind and description.
///
/// Supports optional dynamic detail and an optional source error.
#[macro_export]
macro_rules! testkit_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::TestkitError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::TestkitError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::TestkitError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::TestkitError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Creates and returns a [`crate::error::TestkitError`] from the current function.
///
/// Combines error creation with early return for error conditions that should
/// immediately terminate execution.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return ::core::result::Result::Err($crate::testkit_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::testkit_error!($kind, $desc, source: $source))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return ::core::result::Result::Err($crate::testkit_error!($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::testkit_error!(
            $kind,
            $desc,
            $detail,
            source: $source
        ))
    };
}
