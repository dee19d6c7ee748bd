//! Error types for the Inflight engine
//!
//! This module defines the error types shared by the frame-rotation core
//! and its graphics backends.

use std::fmt;

/// Result type for Inflight engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Inflight engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock, etc.)
    BackendError(String),

    /// Out of GPU or host-visible memory
    OutOfMemory,

    /// Invalid resource (buffer, descriptor set, out-of-range write, etc.)
    InvalidResource(String),

    /// Initialization failed (device context, frame context, configuration)
    InitializationFailed(String),

    /// A descriptor pool has no room left for the requested set
    OutOfPoolMemory,

    /// A descriptor pool is too fragmented to serve the requested set
    FragmentedPool,

    /// The device stopped responding (fence wait failure, lost device)
    DeviceLost(String),
}

impl Error {
    /// Whether a descriptor allocation failing with this error can be retried
    /// on a fresh pool
    pub fn is_pool_exhaustion(&self) -> bool {
        matches!(self, Error::OutOfPoolMemory | Error::FragmentedPool)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::OutOfPoolMemory => write!(f, "Descriptor pool out of memory"),
            Error::FragmentedPool => write!(f, "Descriptor pool fragmented"),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
