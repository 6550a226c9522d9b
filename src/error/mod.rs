//! The unified error handling system for the gateway.

use std::fmt::Display;

// 1. Core Types
pub use types::{ErrorInfo, ErrorResponse, GATEWAY_ERROR_HEADER, GatewayError};

/// A unified `Result` type for the entire crate.
pub type Result<T> = std::result::Result<T, GatewayError>;

// 2. Module declarations
pub mod macros;
pub mod types;

// 3. Context Trait for adding context to errors.
pub trait Context<T, E> {
    /// Wrap the error with a static context message.
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display;

    /// Wrap the error with a lazily built context message.
    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<GatewayError>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display,
    {
        self.with_context(|| context)
    }

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(GatewayError::Context {
                context: context().to_string(),
                source: Box::new(error.into()),
            }),
        }
    }
}
