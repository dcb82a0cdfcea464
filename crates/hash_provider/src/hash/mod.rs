// Copyright (C) Microsoft Corporation. All rights reserved.

//! Hash operations driven through an open [`AlgorithmProvider`].
//!
//! A hash operation runs a fixed pipeline against the provider:
//!
//! 1. Query the hash-object length and allocate the working buffer.
//! 2. Query the digest length and allocate the output buffer.
//! 3. Create an unkeyed hash state backed by the working buffer.
//! 4. Append the input.
//! 5. Finalize into the output buffer and copy the digest out.
//!
//! Any failure aborts the remaining steps. Buffers and the hash state are
//! scoped locals, so whatever was acquired before the failure is released on
//! the way out and nothing acquired later is ever touched. No state is left
//! on the provider between operations.

use crate::scratch::HashState;
use crate::scratch::ScratchBuffer;

use super::*;

impl<N: NativeProviderOp> AlgorithmProvider<N> {
    /// Computes the digest of `data`.
    ///
    /// An empty `data` is valid and yields the digest of the empty message.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::HandleClosed` - If the provider is closed
    /// * `HashProviderError::PropertyQueryFailed` - If a size query fails
    /// * `HashProviderError::AllocationFailed` - If a scratch buffer cannot be allocated
    /// * `HashProviderError::HashCreateFailed` - If the hash state cannot be created
    /// * `HashProviderError::HashUpdateFailed` - If appending the input fails
    /// * `HashProviderError::HashFinalizeFailed` - If finalization fails
    pub fn hash(&self, data: &[u8]) -> Result<Vec<u8>, HashProviderError> {
        self.hash_pipeline("hash", std::iter::once(data))
    }

    /// Computes the digest of the concatenation of `chunks`.
    ///
    /// The chunks are appended to a single hash state in order, so the
    /// result equals [`hash`](Self::hash) over the concatenated bytes.
    ///
    /// # Errors
    ///
    /// Same as [`hash`](Self::hash).
    pub fn hash_chunks<'d, I>(&self, chunks: I) -> Result<Vec<u8>, HashProviderError>
    where
        I: IntoIterator<Item = &'d [u8]>,
    {
        self.hash_pipeline("hash_chunks", chunks)
    }

    fn hash_pipeline<'d, I>(
        &self,
        operation: &'static str,
        chunks: I,
    ) -> Result<Vec<u8>, HashProviderError>
    where
        I: IntoIterator<Item = &'d [u8]>,
    {
        // Held for the whole operation so `close` cannot release the handle
        // underneath a live hash state.
        let guard = self.lock_handle();
        let handle = Self::open_handle(&guard, operation)?;
        let _serial = self.serialize();

        let object_len = self.u32_property(handle, OBJECT_LENGTH)? as usize;
        let mut object = ScratchBuffer::alloc(self.native(), object_len)?;

        let digest_len = self.u32_property(handle, HASH_LENGTH)? as usize;
        let mut output = ScratchBuffer::alloc(self.native(), digest_len)?;

        let mut state = HashState::create(self.native(), handle, &mut object)?;
        let mut appended = 0usize;
        for chunk in chunks {
            state.append(chunk)?;
            appended += chunk.len();
        }
        state.finalize(&mut output)?;

        tracing::debug!(
            algorithm = self.algorithm(),
            object_len,
            digest_len,
            appended,
            "Hash operation complete"
        );

        Ok(output.as_slice().to_vec())
    }
}

/// Computes the digest of `data` with a transient platform provider.
///
/// The provider is opened, used once and closed; a failure to close is
/// reported even though the digest was computed.
///
/// # Errors
///
/// Any error from [`AlgorithmProvider::open`], [`AlgorithmProvider::hash`]
/// or [`AlgorithmProvider::close`].
pub fn digest(algorithm: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, HashProviderError> {
    let provider = AlgorithmProvider::open(ProviderOptions::hash(algorithm))?;
    let digest = provider.hash(data)?;
    provider.close()?;
    Ok(digest)
}
