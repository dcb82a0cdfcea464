// Copyright (C) Microsoft Corporation. All rights reserved.

//! Resource-safe hashing through the platform algorithm provider.
//!
//! This crate wraps a native cryptographic provider (Windows CNG on Windows,
//! an OpenSSL-backed provider with the same contract elsewhere) and drives
//! hash computations through it while guaranteeing that every native
//! resource is released exactly once:
//!
//! - **Provider handle**: [`AlgorithmProvider`] opens the native algorithm
//!   provider on construction and closes it either through
//!   [`AlgorithmProvider::close`] or when dropped, never both.
//! - **Scratch memory**: the hash-object and output buffers are sized by
//!   querying the provider, allocated from the native heap and freed on
//!   every exit path of the operation that allocated them.
//! - **Hash state**: the transient native hash object is bound to its
//!   backing buffer and destroyed before that buffer is released.
//!
//! # Example
//!
//! ```no_run
//! use azihsm_hash_provider::*;
//!
//! let provider = AlgorithmProvider::open(ProviderOptions::hash(HashAlgorithm::Sha256))?;
//! let digest = provider.hash(b"abc")?;
//! assert_eq!(digest.len(), 32);
//! provider.close()?;
//! # Ok::<(), HashProviderError>(())
//! ```

mod hash;
mod native;
mod provider;
mod scratch;

#[cfg(test)]
mod tests;

pub use hash::*;
pub use native::*;
pub use provider::*;
use thiserror::Error;

/// Errors surfaced by provider and hash operations.
///
/// There is one variant per failing native call, plus the caller-discipline
/// errors [`HandleClosed`](Self::HandleClosed) and
/// [`AlreadyClosed`](Self::AlreadyClosed). Use [`operation`](Self::operation)
/// and [`status`](Self::status) for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashProviderError {
    /// Opening the native algorithm provider failed.
    #[error("failed to open algorithm provider `{algorithm}`: status {status}")]
    ProviderOpenFailed {
        /// Algorithm identifier passed to the provider.
        algorithm: String,
        /// Native status code.
        status: NativeStatus,
    },

    /// Querying a provider property failed.
    #[error("failed to query provider property `{property}`: status {status}")]
    PropertyQueryFailed {
        /// Property name queried.
        property: String,
        /// Native status code.
        status: NativeStatus,
    },

    /// Allocating a scratch buffer from the native heap failed.
    #[error("failed to allocate {size} byte scratch buffer: status {status}")]
    AllocationFailed {
        /// Requested size in bytes.
        size: usize,
        /// Native status code.
        status: NativeStatus,
    },

    /// Creating the native hash state failed.
    #[error("failed to create hash state: status {status}")]
    HashCreateFailed {
        /// Native status code.
        status: NativeStatus,
    },

    /// Appending data to the native hash state failed.
    #[error("failed to append data to hash state: status {status}")]
    HashUpdateFailed {
        /// Native status code.
        status: NativeStatus,
    },

    /// Finalizing the native hash state failed.
    #[error("failed to finalize hash state: status {status}")]
    HashFinalizeFailed {
        /// Native status code.
        status: NativeStatus,
    },

    /// Releasing the native algorithm provider failed.
    #[error("failed to close algorithm provider: status {status}")]
    ProviderCloseFailed {
        /// Native status code.
        status: NativeStatus,
    },

    /// The provider was used after it had been closed.
    #[error("`{operation}` called on a closed algorithm provider")]
    HandleClosed {
        /// Public operation that was attempted.
        operation: &'static str,
    },

    /// [`AlgorithmProvider::close`] was called more than once.
    #[error("algorithm provider already closed")]
    AlreadyClosed,
}

impl HashProviderError {
    /// Name of the operation that produced this error.
    ///
    /// For native failures this is the native call that returned a failure
    /// status; for caller-discipline errors it is the public operation.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::ProviderOpenFailed { .. } => "open_provider",
            Self::PropertyQueryFailed { .. } => "get_property",
            Self::AllocationFailed { .. } => "heap_alloc",
            Self::HashCreateFailed { .. } => "create_hash",
            Self::HashUpdateFailed { .. } => "hash_data",
            Self::HashFinalizeFailed { .. } => "finish_hash",
            Self::ProviderCloseFailed { .. } => "close_provider",
            Self::HandleClosed { operation } => operation,
            Self::AlreadyClosed => "close",
        }
    }

    /// Native status code carried by this error, if any.
    pub fn status(&self) -> Option<NativeStatus> {
        match self {
            Self::ProviderOpenFailed { status, .. }
            | Self::PropertyQueryFailed { status, .. }
            | Self::AllocationFailed { status, .. }
            | Self::HashCreateFailed { status }
            | Self::HashUpdateFailed { status }
            | Self::HashFinalizeFailed { status }
            | Self::ProviderCloseFailed { status } => Some(*status),
            Self::HandleClosed { .. } | Self::AlreadyClosed => None,
        }
    }
}

/// Macro for defining platform-specific backend type aliases.
///
/// Windows gets the CNG implementation; every other target gets the
/// OpenSSL-backed implementation.
macro_rules! define_type {
    ($vis:vis $name: ident, $ossl_type: ty, $cng_type: ty) => {
        /// Default backend type for the current platform
        #[cfg(not(target_os = "windows"))]
        $vis type $name = $ossl_type;

        /// Default backend type for the current platform
        #[cfg(target_os = "windows")]
        $vis type $name = $cng_type;
    };
}

pub(crate) use define_type;
