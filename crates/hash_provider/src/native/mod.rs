// Copyright (C) Microsoft Corporation. All rights reserved.

//! Native algorithm provider interface.
//!
//! [`NativeProviderOp`] is the contract this crate consumes from the platform
//! cryptography subsystem. Each method maps onto exactly one native call and
//! reports failure as a non-zero [`NativeStatus`]. The crate never performs
//! cryptographic math itself; it only sequences these calls and owns the
//! resources they hand out.
//!
//! # Platform Support
//!
//! - **Windows**: [`CngProvider`] calls the BCrypt API and the process heap.
//! - **Other targets**: [`OsslProvider`] implements the same contract in
//!   software on top of OpenSSL digests.

use std::fmt;
use std::ptr::NonNull;

use super::*;

#[cfg(not(target_os = "windows"))]
mod native_ossl;
#[cfg(not(target_os = "windows"))]
pub use native_ossl::OsslProvider;

#[cfg(target_os = "windows")]
mod native_cng;
#[cfg(target_os = "windows")]
pub use native_cng::CngProvider;

define_type!(pub NativeProvider, native_ossl::OsslProvider, native_cng::CngProvider);

/// Property holding the size in bytes of the hash-object working buffer.
pub const OBJECT_LENGTH: &str = "ObjectLength";

/// Property holding the digest length in bytes.
pub const HASH_LENGTH: &str = "HashDigestLength";

/// Property holding the hash block length in bytes.
pub const HASH_BLOCK_LENGTH: &str = "HashBlockLength";

/// Property holding the algorithm name as a NUL-terminated UTF-16 string.
pub const ALGORITHM_NAME: &str = "AlgorithmName";

/// Name of the default primitive provider implementation.
pub const PRIMITIVE_PROVIDER: &str = "Microsoft Primitive Provider";

/// Native status code. Zero denotes success.
///
/// Values follow the NTSTATUS encoding used by the platform provider.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeStatus(pub i32);

impl NativeStatus {
    /// The operation completed successfully.
    pub const SUCCESS: Self = Self(0);
    /// Unspecified failure.
    pub const UNSUCCESSFUL: Self = Self(0xC000_0001_u32 as i32);
    /// The handle is not valid for the requested operation.
    pub const INVALID_HANDLE: Self = Self(0xC000_0008_u32 as i32);
    /// One of the parameters is not valid.
    pub const INVALID_PARAMETER: Self = Self(0xC000_000D_u32 as i32);
    /// Out of memory.
    pub const NO_MEMORY: Self = Self(0xC000_0017_u32 as i32);
    /// The supplied buffer is too small.
    pub const BUFFER_TOO_SMALL: Self = Self(0xC000_0023_u32 as i32);
    /// The request is not supported.
    pub const NOT_SUPPORTED: Self = Self(0xC000_00BB_u32 as i32);
    /// The supplied buffer has an invalid size.
    pub const INVALID_BUFFER_SIZE: Self = Self(0xC000_0206_u32 as i32);
    /// The requested object was not found.
    pub const NOT_FOUND: Self = Self(0xC000_0225_u32 as i32);

    /// Returns `true` if this status denotes success.
    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Converts the status into a `Result`.
    pub fn ok(self) -> Result<(), NativeStatus> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0 as u32)
    }
}

impl fmt::Debug for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeStatus({})", self)
    }
}

/// Opaque handle to an open native algorithm provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlgHandle(usize);

impl AlgHandle {
    /// Wraps a raw native handle value.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw native handle value.
    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// Opaque handle to a native hash state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashHandle(usize);

impl HashHandle {
    /// Wraps a raw native handle value.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw native handle value.
    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// Native algorithm provider capability.
///
/// Implementations are thin shims over the platform API. They must not hold
/// resources on behalf of the caller beyond what the handles they return
/// represent; all lifetime management lives in this crate's wrappers.
pub trait NativeProviderOp {
    /// Opens an algorithm provider for `algorithm`.
    ///
    /// # Arguments
    ///
    /// * `algorithm` - Platform algorithm identifier (e.g. `SHA256`)
    /// * `implementation` - Optional provider implementation name
    /// * `flags` - Raw open flags, passed through uninterpreted
    fn open_provider(
        &self,
        algorithm: &str,
        implementation: Option<&str>,
        flags: u32,
    ) -> Result<AlgHandle, NativeStatus>;

    /// Reads a provider property.
    ///
    /// When `output` is `None` only the required size is reported. Returns
    /// the number of bytes required or written.
    fn get_property(
        &self,
        handle: AlgHandle,
        property: &str,
        output: Option<&mut [u8]>,
    ) -> Result<u32, NativeStatus>;

    /// Creates a hash state backed by the caller-owned `object` buffer.
    ///
    /// The buffer must stay valid and unmoved until
    /// [`destroy_hash`](Self::destroy_hash) returns.
    fn create_hash(
        &self,
        handle: AlgHandle,
        object: &mut [u8],
        secret: Option<&[u8]>,
        flags: u32,
    ) -> Result<HashHandle, NativeStatus>;

    /// Appends `data` to the hash state.
    fn hash_data(&self, hash: HashHandle, data: &[u8], flags: u32) -> Result<(), NativeStatus>;

    /// Finalizes the hash state into `output`, which must be exactly the
    /// digest length.
    fn finish_hash(
        &self,
        hash: HashHandle,
        output: &mut [u8],
        flags: u32,
    ) -> Result<(), NativeStatus>;

    /// Destroys the hash state. Its backing buffer may be freed afterwards.
    fn destroy_hash(&self, hash: HashHandle) -> Result<(), NativeStatus>;

    /// Releases the algorithm provider.
    fn close_provider(&self, handle: AlgHandle, flags: u32) -> Result<(), NativeStatus>;

    /// Allocates `size` zero-initialized bytes from the process heap.
    fn heap_alloc(&self, size: usize) -> Result<NonNull<u8>, NativeStatus>;

    /// Frees memory returned by [`heap_alloc`](Self::heap_alloc).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `heap_alloc` on the same provider with the same
    /// `size`, and must not have been freed already.
    #[allow(unsafe_code)]
    unsafe fn heap_free(&self, ptr: NonNull<u8>, size: usize) -> Result<(), NativeStatus>;
}
