// Copyright (C) Microsoft Corporation. All rights reserved.

//! OpenSSL-backed native provider for non-Windows targets.
//!
//! This provider reproduces the CNG calling contract in software so the
//! lifecycle code above it behaves identically on every platform:
//!
//! - properties are read through the same two-phase size/value protocol;
//! - hash states require a caller-supplied working buffer of at least
//!   [`OBJECT_LENGTH`] bytes;
//! - finalization requires an output buffer of exactly the digest length;
//! - failures are reported with NTSTATUS-style codes.
//!
//! Handles index into per-provider tables guarded by a mutex, so a single
//! `OsslProvider` can be shared between threads.

use std::alloc::Layout;
use std::collections::HashMap;
use std::ptr::NonNull;

use openssl::hash::Hasher;
use openssl::hash::MessageDigest;
use parking_lot::Mutex;

use super::*;
use crate::OpenFlags;

/// Alignment of heap allocations, matching the platform heap guarantee.
const HEAP_ALIGN: usize = 16;

/// Native provider implemented with OpenSSL digests.
#[derive(Debug, Default)]
pub struct OsslProvider {
    tables: Mutex<OsslTables>,
}

#[derive(Default)]
struct OsslTables {
    next_handle: usize,
    algs: HashMap<usize, OsslAlg>,
    hashes: HashMap<usize, OsslHashState>,
}

impl std::fmt::Debug for OsslTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsslTables")
            .field("algs", &self.algs.len())
            .field("hashes", &self.hashes.len())
            .finish()
    }
}

impl OsslTables {
    fn insert_handle(&mut self) -> usize {
        // Zero is never handed out so it can stand for "no handle".
        self.next_handle += 1;
        self.next_handle
    }
}

struct OsslAlg {
    name: &'static str,
    md: MessageDigest,
    reusable: bool,
}

impl OsslAlg {
    /// Size of the working buffer a hash state requires.
    fn object_len(&self) -> usize {
        std::mem::size_of::<usize>() + 2 * self.md.block_size()
    }
}

struct OsslHashState {
    alg: usize,
    hasher: Hasher,
    digest_len: usize,
    reusable: bool,
    finished: bool,
}

/// Maps a platform algorithm identifier to its OpenSSL digest.
fn lookup_digest(algorithm: &str) -> Option<(&'static str, MessageDigest)> {
    match algorithm {
        "SHA1" => Some(("SHA1", MessageDigest::sha1())),
        "SHA256" => Some(("SHA256", MessageDigest::sha256())),
        "SHA384" => Some(("SHA384", MessageDigest::sha384())),
        "SHA512" => Some(("SHA512", MessageDigest::sha512())),
        _ => None,
    }
}

/// Copies a property value into `output` using the two-phase protocol.
fn write_property(value: &[u8], output: Option<&mut [u8]>) -> Result<u32, NativeStatus> {
    let len = value.len() as u32;
    match output {
        None => Ok(len),
        Some(output) if output.len() < value.len() => Err(NativeStatus::BUFFER_TOO_SMALL),
        Some(output) => {
            output[..value.len()].copy_from_slice(value);
            Ok(len)
        }
    }
}

fn heap_layout(size: usize) -> Result<Layout, NativeStatus> {
    Layout::from_size_align(size.max(1), HEAP_ALIGN).map_err(|_| NativeStatus::NO_MEMORY)
}

impl NativeProviderOp for OsslProvider {
    fn open_provider(
        &self,
        algorithm: &str,
        implementation: Option<&str>,
        flags: u32,
    ) -> Result<AlgHandle, NativeStatus> {
        if implementation.is_some_and(|name| name != PRIMITIVE_PROVIDER) {
            tracing::debug!(?implementation, "Unknown provider implementation");
            return Err(NativeStatus::NOT_FOUND);
        }
        let (name, md) = lookup_digest(algorithm).ok_or(NativeStatus::NOT_FOUND)?;

        let flags = OpenFlags::from_bits_retain(flags);
        if flags.contains(OpenFlags::HMAC) {
            // Keyed hashing is not offered by the software provider.
            return Err(NativeStatus::NOT_SUPPORTED);
        }

        let mut tables = self.tables.lock();
        let handle = tables.insert_handle();
        tables.algs.insert(
            handle,
            OsslAlg {
                name,
                md,
                reusable: flags.contains(OpenFlags::HASH_REUSABLE),
            },
        );

        Ok(AlgHandle::from_raw(handle))
    }

    fn get_property(
        &self,
        handle: AlgHandle,
        property: &str,
        output: Option<&mut [u8]>,
    ) -> Result<u32, NativeStatus> {
        let tables = self.tables.lock();
        let alg = tables
            .algs
            .get(&handle.as_raw())
            .ok_or(NativeStatus::INVALID_HANDLE)?;

        match property {
            OBJECT_LENGTH => write_property(&(alg.object_len() as u32).to_le_bytes(), output),
            HASH_LENGTH => write_property(&(alg.md.size() as u32).to_le_bytes(), output),
            HASH_BLOCK_LENGTH => {
                write_property(&(alg.md.block_size() as u32).to_le_bytes(), output)
            }
            ALGORITHM_NAME => {
                let name = alg
                    .name
                    .encode_utf16()
                    .chain(std::iter::once(0))
                    .flat_map(u16::to_le_bytes)
                    .collect::<Vec<u8>>();
                write_property(&name, output)
            }
            _ => Err(NativeStatus::NOT_SUPPORTED),
        }
    }

    fn create_hash(
        &self,
        handle: AlgHandle,
        object: &mut [u8],
        secret: Option<&[u8]>,
        _flags: u32,
    ) -> Result<HashHandle, NativeStatus> {
        if secret.is_some() {
            return Err(NativeStatus::INVALID_PARAMETER);
        }

        let mut tables = self.tables.lock();
        let alg = tables
            .algs
            .get(&handle.as_raw())
            .ok_or(NativeStatus::INVALID_HANDLE)?;
        if object.len() < alg.object_len() {
            return Err(NativeStatus::BUFFER_TOO_SMALL);
        }

        let hasher = Hasher::new(alg.md).map_err(|openssl_error_stack| {
            tracing::error!(?openssl_error_stack);
            NativeStatus::UNSUCCESSFUL
        })?;
        let state = OsslHashState {
            alg: handle.as_raw(),
            hasher,
            digest_len: alg.md.size(),
            reusable: alg.reusable,
            finished: false,
        };

        let hash = tables.insert_handle();
        object[..std::mem::size_of::<usize>()].copy_from_slice(&hash.to_le_bytes());
        tables.hashes.insert(hash, state);

        Ok(HashHandle::from_raw(hash))
    }

    fn hash_data(&self, hash: HashHandle, data: &[u8], _flags: u32) -> Result<(), NativeStatus> {
        let mut tables = self.tables.lock();
        let state = tables
            .hashes
            .get_mut(&hash.as_raw())
            .filter(|state| !state.finished)
            .ok_or(NativeStatus::INVALID_HANDLE)?;

        state.hasher.update(data).map_err(|openssl_error_stack| {
            tracing::error!(?openssl_error_stack);
            NativeStatus::UNSUCCESSFUL
        })
    }

    fn finish_hash(
        &self,
        hash: HashHandle,
        output: &mut [u8],
        _flags: u32,
    ) -> Result<(), NativeStatus> {
        let mut tables = self.tables.lock();
        let state = tables
            .hashes
            .get_mut(&hash.as_raw())
            .filter(|state| !state.finished)
            .ok_or(NativeStatus::INVALID_HANDLE)?;
        if output.len() != state.digest_len {
            return Err(NativeStatus::INVALID_PARAMETER);
        }

        let digest = state.hasher.finish().map_err(|openssl_error_stack| {
            tracing::error!(?openssl_error_stack);
            NativeStatus::UNSUCCESSFUL
        })?;
        output.copy_from_slice(&digest);

        // OpenSSL resets the hasher after finish, which is exactly the
        // reusable-hash behavior; otherwise the state is spent.
        state.finished = !state.reusable;

        Ok(())
    }

    fn destroy_hash(&self, hash: HashHandle) -> Result<(), NativeStatus> {
        self.tables
            .lock()
            .hashes
            .remove(&hash.as_raw())
            .map(|_| ())
            .ok_or(NativeStatus::INVALID_HANDLE)
    }

    fn close_provider(&self, handle: AlgHandle, _flags: u32) -> Result<(), NativeStatus> {
        let mut tables = self.tables.lock();
        tables
            .algs
            .remove(&handle.as_raw())
            .ok_or(NativeStatus::INVALID_HANDLE)?;

        let orphans = tables
            .hashes
            .values()
            .filter(|state| state.alg == handle.as_raw())
            .count();
        if orphans > 0 {
            tracing::warn!(orphans, "Provider closed with live hash states");
        }

        Ok(())
    }

    #[allow(unsafe_code)]
    fn heap_alloc(&self, size: usize) -> Result<NonNull<u8>, NativeStatus> {
        let layout = heap_layout(size)?;

        //SAFETY: `layout` has a non-zero size
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };

        NonNull::new(ptr).ok_or(NativeStatus::NO_MEMORY)
    }

    #[allow(unsafe_code)]
    unsafe fn heap_free(&self, ptr: NonNull<u8>, size: usize) -> Result<(), NativeStatus> {
        let layout = heap_layout(size)?;

        //SAFETY: `ptr` was allocated by `heap_alloc` with this layout (caller contract)
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) };

        Ok(())
    }
}
