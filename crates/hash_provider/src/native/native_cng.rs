// Copyright (C) Microsoft Corporation. All rights reserved.

//! Windows CNG (Cryptography Next Generation) native provider.
//!
//! Each method forwards to the matching BCrypt call. Scratch memory comes
//! from the process heap so that buffers handed to CNG have the same
//! provenance as in native callers.

use std::ffi::c_void;
use std::iter;
use std::ptr::NonNull;

use windows::core::PCWSTR;
use windows::Win32::Foundation::NTSTATUS;
use windows::Win32::Security::Cryptography::*;
use windows::Win32::System::Memory::*;

use super::*;

/// Native provider backed by Windows CNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct CngProvider;

/// Encodes `value` as a NUL-terminated UTF-16 string.
fn wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(iter::once(0)).collect()
}

fn check(status: NTSTATUS) -> Result<(), NativeStatus> {
    NativeStatus(status.0).ok()
}

fn alg_handle(handle: AlgHandle) -> BCRYPT_ALG_HANDLE {
    BCRYPT_ALG_HANDLE(handle.as_raw() as *mut c_void)
}

fn hash_handle(handle: HashHandle) -> BCRYPT_HASH_HANDLE {
    BCRYPT_HASH_HANDLE(handle.as_raw() as *mut c_void)
}

fn win32_status(error: windows::core::Error) -> NativeStatus {
    NativeStatus(error.code().0)
}

impl NativeProviderOp for CngProvider {
    #[allow(unsafe_code)]
    fn open_provider(
        &self,
        algorithm: &str,
        implementation: Option<&str>,
        flags: u32,
    ) -> Result<AlgHandle, NativeStatus> {
        let algorithm = wide(algorithm);
        let implementation = implementation.map(wide);
        let implementation = implementation
            .as_ref()
            .map_or(PCWSTR::null(), |name| PCWSTR(name.as_ptr()));
        let mut handle = BCRYPT_ALG_HANDLE::default();

        //SAFETY: Calling Windows CNG API directly; both strings outlive the call
        let status = unsafe {
            BCryptOpenAlgorithmProvider(
                &mut handle,
                PCWSTR(algorithm.as_ptr()),
                implementation,
                BCRYPT_OPEN_ALGORITHM_PROVIDER_FLAGS(flags),
            )
        };
        check(status)?;

        Ok(AlgHandle::from_raw(handle.0 as usize))
    }

    #[allow(unsafe_code)]
    fn get_property(
        &self,
        handle: AlgHandle,
        property: &str,
        output: Option<&mut [u8]>,
    ) -> Result<u32, NativeStatus> {
        let property = wide(property);
        let mut result_len = 0u32;

        //SAFETY: Calling Windows CNG API directly; `output` is a valid slice or None
        let status = unsafe {
            BCryptGetProperty(
                alg_handle(handle),
                PCWSTR(property.as_ptr()),
                output,
                &mut result_len,
                0,
            )
        };
        check(status)?;

        Ok(result_len)
    }

    #[allow(unsafe_code)]
    fn create_hash(
        &self,
        handle: AlgHandle,
        object: &mut [u8],
        secret: Option<&[u8]>,
        flags: u32,
    ) -> Result<HashHandle, NativeStatus> {
        let mut hash = BCRYPT_HASH_HANDLE::default();

        //SAFETY: Calling Windows CNG API directly; the caller keeps `object`
        // alive and pinned until `destroy_hash`
        let status =
            unsafe { BCryptCreateHash(alg_handle(handle), &mut hash, Some(object), secret, flags) };
        check(status)?;

        Ok(HashHandle::from_raw(hash.0 as usize))
    }

    #[allow(unsafe_code)]
    fn hash_data(&self, hash: HashHandle, data: &[u8], flags: u32) -> Result<(), NativeStatus> {
        //SAFETY: Calling Windows CNG API directly
        let status = unsafe { BCryptHashData(hash_handle(hash), data, flags) };
        check(status)
    }

    #[allow(unsafe_code)]
    fn finish_hash(
        &self,
        hash: HashHandle,
        output: &mut [u8],
        flags: u32,
    ) -> Result<(), NativeStatus> {
        //SAFETY: Calling Windows CNG API directly
        let status = unsafe { BCryptFinishHash(hash_handle(hash), output, flags) };
        check(status)
    }

    #[allow(unsafe_code)]
    fn destroy_hash(&self, hash: HashHandle) -> Result<(), NativeStatus> {
        //SAFETY: Calling Windows CNG API directly; the handle is destroyed once
        let status = unsafe { BCryptDestroyHash(hash_handle(hash)) };
        check(status)
    }

    #[allow(unsafe_code)]
    fn close_provider(&self, handle: AlgHandle, flags: u32) -> Result<(), NativeStatus> {
        //SAFETY: Calling Windows CNG API directly; the handle is closed once
        let status = unsafe { BCryptCloseAlgorithmProvider(alg_handle(handle), flags) };
        check(status)
    }

    #[allow(unsafe_code)]
    fn heap_alloc(&self, size: usize) -> Result<NonNull<u8>, NativeStatus> {
        //SAFETY: GetProcessHeap has no preconditions
        let heap = unsafe { GetProcessHeap() }.map_err(win32_status)?;

        //SAFETY: Allocating from the process heap; freed through `heap_free`
        let ptr = unsafe { HeapAlloc(heap, HEAP_ZERO_MEMORY, size) };

        NonNull::new(ptr as *mut u8).ok_or(NativeStatus::NO_MEMORY)
    }

    #[allow(unsafe_code)]
    unsafe fn heap_free(&self, ptr: NonNull<u8>, _size: usize) -> Result<(), NativeStatus> {
        //SAFETY: GetProcessHeap has no preconditions
        let heap = unsafe { GetProcessHeap() }.map_err(win32_status)?;

        //SAFETY: `ptr` was returned by HeapAlloc on the process heap (caller contract)
        unsafe { HeapFree(heap, HEAP_FLAGS(0), Some(ptr.as_ptr() as *const c_void)) }
            .map_err(win32_status)
    }
}
