// Copyright (C) Microsoft Corporation. All rights reserved.

//! Algorithm provider handle.
//!
//! [`AlgorithmProvider`] owns one native algorithm-provider context for its
//! whole lifetime. The context is opened on construction and released
//! exactly once, either by [`AlgorithmProvider::close`] or, if the owner
//! never closed it, when the provider is dropped.

use std::fmt;

use parking_lot::Mutex;
use parking_lot::RwLock;

use super::*;

bitflags::bitflags! {
    /// Algorithm provider open flags.
    ///
    /// Bits not named here are retained and handed to the native provider
    /// uninterpreted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpenFlags: u32 {
        /// Load the provider into the dispatch environment.
        const PROV_DISPATCH = 0x0000_0001;
        /// Open the provider for keyed (HMAC) hashing.
        const HMAC = 0x0000_0008;
        /// Hash states may be finalized and reused, and the provider may
        /// serve concurrent hash operations.
        const HASH_REUSABLE = 0x0000_0020;

        const _ = !0;
    }
}

/// Well-known hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-1
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HashAlgorithm {
    /// Returns the platform algorithm identifier.
    pub fn identifier(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha384 => "SHA384",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Options used to open an [`AlgorithmProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOptions {
    algorithm: String,
    implementation: Option<String>,
    flags: OpenFlags,
}

impl ProviderOptions {
    /// Creates options for the given platform algorithm identifier.
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            implementation: None,
            flags: OpenFlags::empty(),
        }
    }

    /// Creates options for one of the well-known hash algorithms.
    pub fn hash(algorithm: HashAlgorithm) -> Self {
        Self::new(algorithm.identifier())
    }

    /// Selects a specific provider implementation by name.
    pub fn with_implementation(mut self, implementation: impl Into<String>) -> Self {
        self.implementation = Some(implementation.into());
        self
    }

    /// Sets the open flags.
    pub fn with_flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Algorithm identifier.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Provider implementation name, if one was selected.
    pub fn implementation(&self) -> Option<&str> {
        self.implementation.as_deref()
    }

    /// Open flags.
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }
}

/// Handle to an open native algorithm provider.
///
/// The provider is either open, in which case [`hash`](Self::hash) and the
/// property queries reach the native layer, or closed, in which case every
/// operation fails with [`HashProviderError::HandleClosed`] without touching
/// native code.
///
/// # Concurrency
///
/// Hash operations share the handle read-only. Unless the provider was
/// opened with [`OpenFlags::HASH_REUSABLE`] they are additionally
/// serialized through an internal lock. [`close`](Self::close) waits for
/// in-flight operations to complete.
pub struct AlgorithmProvider<N: NativeProviderOp = NativeProvider> {
    native: N,
    options: ProviderOptions,
    handle: RwLock<Option<AlgHandle>>,
    serial: Mutex<()>,
}

impl AlgorithmProvider<NativeProvider> {
    /// Opens the platform algorithm provider described by `options`.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::ProviderOpenFailed` - If the native open call fails
    pub fn open(options: ProviderOptions) -> Result<Self, HashProviderError> {
        Self::open_with(NativeProvider::default(), options)
    }
}

impl<N: NativeProviderOp> AlgorithmProvider<N> {
    /// Opens an algorithm provider through the given native backend.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::ProviderOpenFailed` - If the native open call fails
    pub fn open_with(native: N, options: ProviderOptions) -> Result<Self, HashProviderError> {
        let handle = native
            .open_provider(
                options.algorithm(),
                options.implementation(),
                options.flags().bits(),
            )
            .map_err(|status| {
                tracing::error!(
                    algorithm = options.algorithm(),
                    implementation = ?options.implementation(),
                    %status,
                    "Failed to open algorithm provider"
                );
                HashProviderError::ProviderOpenFailed {
                    algorithm: options.algorithm().to_string(),
                    status,
                }
            })?;

        tracing::debug!(
            algorithm = options.algorithm(),
            handle = handle.as_raw(),
            "Opened algorithm provider"
        );

        Ok(Self {
            native,
            options,
            handle: RwLock::new(Some(handle)),
            serial: Mutex::new(()),
        })
    }

    /// Algorithm identifier the provider was opened with.
    pub fn algorithm(&self) -> &str {
        self.options.algorithm()
    }

    /// Provider implementation name, if one was selected.
    pub fn implementation(&self) -> Option<&str> {
        self.options.implementation()
    }

    /// Open flags the provider was opened with.
    pub fn flags(&self) -> OpenFlags {
        self.options.flags()
    }

    /// Returns `true` until the provider has been closed.
    pub fn is_open(&self) -> bool {
        self.handle.read().is_some()
    }

    /// Returns the native backend.
    pub fn native(&self) -> &N {
        &self.native
    }

    /// Returns the number of bytes a property value occupies.
    ///
    /// This is the first phase of a property query.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::HandleClosed` - If the provider is closed
    /// * `HashProviderError::PropertyQueryFailed` - If the native query fails
    pub fn property_size(&self, property: &str) -> Result<usize, HashProviderError> {
        let guard = self.handle.read();
        let handle = Self::open_handle(&guard, "property_size")?;
        self.property_len(handle, property)
    }

    /// Reads a property value into an owned buffer sized by the provider.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::HandleClosed` - If the provider is closed
    /// * `HashProviderError::PropertyQueryFailed` - If either query phase fails
    pub fn query_property(&self, property: &str) -> Result<Vec<u8>, HashProviderError> {
        let guard = self.handle.read();
        let handle = Self::open_handle(&guard, "query_property")?;
        self.buffered_property(handle, property)
    }

    /// Reads a 32-bit little-endian property value.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::HandleClosed` - If the provider is closed
    /// * `HashProviderError::PropertyQueryFailed` - If the query fails or the
    ///   value is not four bytes wide
    pub fn query_u32_property(&self, property: &str) -> Result<u32, HashProviderError> {
        let guard = self.handle.read();
        let handle = Self::open_handle(&guard, "query_u32_property")?;
        self.u32_property(handle, property)
    }

    /// Digest length in bytes, as reported by the provider.
    pub fn digest_len(&self) -> Result<usize, HashProviderError> {
        Ok(self.query_u32_property(HASH_LENGTH)? as usize)
    }

    /// Hash-object working buffer length in bytes, as reported by the provider.
    pub fn object_len(&self) -> Result<usize, HashProviderError> {
        Ok(self.query_u32_property(OBJECT_LENGTH)? as usize)
    }

    /// Releases the native provider.
    ///
    /// The provider is marked closed before the native release runs, so a
    /// failed release is never retried, neither here nor on drop.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::AlreadyClosed` - If the provider was already closed
    /// * `HashProviderError::ProviderCloseFailed` - If the native release fails
    pub fn close(&self) -> Result<(), HashProviderError> {
        let handle = self
            .handle
            .write()
            .take()
            .ok_or(HashProviderError::AlreadyClosed)?;
        self.release(handle)
    }

    fn release(&self, handle: AlgHandle) -> Result<(), HashProviderError> {
        self.native.close_provider(handle, 0).map_err(|status| {
            tracing::error!(algorithm = self.algorithm(), %status, "Failed to close algorithm provider");
            HashProviderError::ProviderCloseFailed { status }
        })?;

        tracing::debug!(
            algorithm = self.algorithm(),
            handle = handle.as_raw(),
            "Closed algorithm provider"
        );
        Ok(())
    }

    pub(crate) fn open_handle(
        handle: &Option<AlgHandle>,
        operation: &'static str,
    ) -> Result<AlgHandle, HashProviderError> {
        handle.ok_or_else(|| {
            tracing::error!(operation, "Algorithm provider used after close");
            HashProviderError::HandleClosed { operation }
        })
    }

    pub(crate) fn lock_handle(&self) -> parking_lot::RwLockReadGuard<'_, Option<AlgHandle>> {
        self.handle.read()
    }

    /// Serializes hash operations unless the provider is reusable.
    pub(crate) fn serialize(&self) -> Option<parking_lot::MutexGuard<'_, ()>> {
        (!self.flags().contains(OpenFlags::HASH_REUSABLE)).then(|| self.serial.lock())
    }

    pub(crate) fn property_len(
        &self,
        handle: AlgHandle,
        property: &str,
    ) -> Result<usize, HashProviderError> {
        let len = self
            .native
            .get_property(handle, property, None)
            .map_err(|status| property_error(property, status))?;
        Ok(len as usize)
    }

    /// Two-phase property read: size query, allocate, value query.
    pub(crate) fn buffered_property(
        &self,
        handle: AlgHandle,
        property: &str,
    ) -> Result<Vec<u8>, HashProviderError> {
        let len = self.property_len(handle, property)?;

        let mut value = vec![0u8; len];
        let written = self
            .native
            .get_property(handle, property, Some(&mut value))
            .map_err(|status| property_error(property, status))?;
        value.truncate(written as usize);

        Ok(value)
    }

    pub(crate) fn u32_property(
        &self,
        handle: AlgHandle,
        property: &str,
    ) -> Result<u32, HashProviderError> {
        let value = self.buffered_property(handle, property)?;
        let value = <[u8; 4]>::try_from(value.as_slice()).map_err(|_| {
            tracing::error!(property, len = value.len(), "Unexpected property width");
            HashProviderError::PropertyQueryFailed {
                property: property.to_string(),
                status: NativeStatus::INVALID_BUFFER_SIZE,
            }
        })?;
        Ok(u32::from_le_bytes(value))
    }
}

fn property_error(property: &str, status: NativeStatus) -> HashProviderError {
    tracing::error!(property, %status, "Failed to query provider property");
    HashProviderError::PropertyQueryFailed {
        property: property.to_string(),
        status,
    }
}

impl<N: NativeProviderOp> Drop for AlgorithmProvider<N> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            tracing::debug!(
                algorithm = self.algorithm(),
                "Releasing algorithm provider on drop"
            );
            if let Err(error) = self.release(handle) {
                tracing::warn!(%error, "Ignoring failure to release algorithm provider in Drop");
            }
        }
    }
}

impl<N: NativeProviderOp> fmt::Debug for AlgorithmProvider<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmProvider")
            .field("algorithm", &self.algorithm())
            .field("implementation", &self.implementation())
            .field("flags", &self.flags())
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests;
