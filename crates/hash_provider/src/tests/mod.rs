// Copyright (C) Microsoft Corporation. All rights reserved.

//! Shared test support: tracing setup and a counting native provider.

// Test-only code; `unwrap` is fine here.
#![allow(clippy::unwrap_used)]


pub(crate) use counting::*;
use tracing_subscriber::EnvFilter;

use super::*;

/// Initializes `tracing` output for tests once per process.
///
/// `RUST_LOG` selects the filter; the default shows debug events.
pub(crate) fn init_tracing() {
    static ONCE: std::sync::Once = std::sync::Once::new();

    ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_ansi(false) // avoid polluting logs with escape sequences
            .with_test_writer()
            .with_thread_ids(true)
            .with_env_filter(filter)
            .try_init();
    });
}

/// SHA-256 test vectors as `(message, hex digest)`.
pub(crate) const SHA256_VECTORS: &[(&[u8], &str)] = &[
    (
        b"".as_slice(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
    ),
    (
        b"abc".as_slice(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
    ),
    (
        b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq".as_slice(),
        "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1",
    ),
];

/// Opens a provider for `algorithm` over a fresh counting backend.
pub(crate) fn open_counting(
    algorithm: HashAlgorithm,
) -> (AlgorithmProvider<CountingProvider>, ProbeRef) {
    init_tracing();
    let native = CountingProvider::default();
    let probe = native.probe();
    let provider = AlgorithmProvider::open_with(native, ProviderOptions::hash(algorithm)).unwrap();
    (provider, probe)
}
