// Copyright (C) Microsoft Corporation. All rights reserved.

//! Scoped native resources used by a single hash operation.
//!
//! Both types release their native resource in `Drop`, so every exit path of
//! the operation that created them, including early returns through `?`,
//! frees exactly what was acquired. Release failures are logged; there is no
//! caller left to report them to.

use std::marker::PhantomData;
use std::ptr::NonNull;

use super::*;

/// Native-heap allocation sized by a provider query.
pub(crate) struct ScratchBuffer<'a, N: NativeProviderOp> {
    native: &'a N,
    ptr: NonNull<u8>,
    len: usize,
}

impl<'a, N: NativeProviderOp> ScratchBuffer<'a, N> {
    /// Allocates `len` zeroed bytes from the native heap.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::AllocationFailed` - If the heap allocation fails
    pub(crate) fn alloc(native: &'a N, len: usize) -> Result<Self, HashProviderError> {
        let ptr = native.heap_alloc(len).map_err(|status| {
            tracing::error!(size = len, %status, "Failed to allocate scratch buffer");
            HashProviderError::AllocationFailed { size: len, status }
        })?;

        Ok(Self { native, ptr, len })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[allow(unsafe_code)]
    pub(crate) fn as_slice(&self) -> &[u8] {
        //SAFETY: `ptr` is a live, zero-initialized allocation of `len` bytes
        // owned by `self`
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[allow(unsafe_code)]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        //SAFETY: `ptr` is a live, zero-initialized allocation of `len` bytes
        // exclusively borrowed through `self`
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<N: NativeProviderOp> Drop for ScratchBuffer<'_, N> {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        //SAFETY: `ptr` came from `heap_alloc` with `len` and is freed only here
        let result = unsafe { self.native.heap_free(self.ptr, self.len) };
        if let Err(status) = result {
            tracing::error!(size = self.len, %status, "Failed to free scratch buffer in Drop");
        }
    }
}

/// Native hash state backed by a [`ScratchBuffer`].
///
/// The state holds an exclusive borrow of its backing buffer, so the buffer
/// can neither move nor be freed while the native object exists.
pub(crate) struct HashState<'a, N: NativeProviderOp> {
    native: &'a N,
    handle: HashHandle,
    _object: PhantomData<&'a mut [u8]>,
}

impl<'a, N: NativeProviderOp> HashState<'a, N> {
    /// Creates an unkeyed hash state using `object` as working memory.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::HashCreateFailed` - If the native create call fails
    pub(crate) fn create(
        native: &'a N,
        provider: AlgHandle,
        object: &'a mut ScratchBuffer<'_, N>,
    ) -> Result<Self, HashProviderError> {
        let handle = native
            .create_hash(provider, object.as_mut_slice(), None, 0)
            .map_err(|status| {
                tracing::error!(object_len = object.len(), %status, "Failed to create hash state");
                HashProviderError::HashCreateFailed { status }
            })?;

        Ok(Self {
            native,
            handle,
            _object: PhantomData,
        })
    }

    /// Appends `data` to the hash state.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::HashUpdateFailed` - If the native append fails
    pub(crate) fn append(&mut self, data: &[u8]) -> Result<(), HashProviderError> {
        self.native
            .hash_data(self.handle, data, 0)
            .map_err(|status| {
                tracing::error!(len = data.len(), %status, "Failed to update hash");
                HashProviderError::HashUpdateFailed { status }
            })
    }

    /// Finalizes the hash state into `output`.
    ///
    /// # Errors
    ///
    /// * `HashProviderError::HashFinalizeFailed` - If the native finalize fails
    pub(crate) fn finalize(
        &mut self,
        output: &mut ScratchBuffer<'_, N>,
    ) -> Result<(), HashProviderError> {
        self.native
            .finish_hash(self.handle, output.as_mut_slice(), 0)
            .map_err(|status| {
                tracing::error!(digest_len = output.len(), %status, "Failed to finish hash");
                HashProviderError::HashFinalizeFailed { status }
            })
    }
}

impl<N: NativeProviderOp> Drop for HashState<'_, N> {
    fn drop(&mut self) {
        if let Err(status) = self.native.destroy_hash(self.handle) {
            tracing::error!(%status, "Failed to destroy hash state in Drop");
        }
    }
}
