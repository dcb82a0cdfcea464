// Copyright (C) Microsoft Corporation. All rights reserved.

#![allow(clippy::unwrap_used)]

use super::*;
use crate::tests::*;

const ALGORITHMS: [HashAlgorithm; 4] = [
    HashAlgorithm::Sha1,
    HashAlgorithm::Sha256,
    HashAlgorithm::Sha384,
    HashAlgorithm::Sha512,
];

#[test]
fn test_open_then_close_is_balanced() {
    for algorithm in ALGORITHMS {
        let (provider, probe) = open_counting(algorithm);
        assert!(provider.is_open());
        assert_eq!(provider.algorithm(), algorithm.identifier());

        provider.close().unwrap();
        assert!(!provider.is_open());
        drop(provider);

        let probe = probe.lock();
        assert_eq!(probe.opens, 1);
        assert_eq!(probe.closes, 1);
        assert_eq!(probe.hash_calls(), 0);
        probe.assert_balanced();
    }
}

#[test]
fn test_close_twice_reports_already_closed() {
    let (provider, probe) = open_counting(HashAlgorithm::Sha256);

    provider.close().unwrap();
    let result = provider.close();
    assert_eq!(result, Err(HashProviderError::AlreadyClosed));

    drop(provider);
    assert_eq!(probe.lock().closes, 1);
}

#[test]
fn test_drop_releases_open_provider() {
    let (provider, probe) = open_counting(HashAlgorithm::Sha384);
    assert_eq!(probe.lock().closes, 0);

    drop(provider);
    assert_eq!(probe.lock().closes, 1);
}

#[test]
fn test_close_failure_is_not_retried() {
    let (provider, probe) = open_counting(HashAlgorithm::Sha256);
    provider
        .native()
        .fail_at(FaultPoint::Close, NativeStatus::INVALID_HANDLE);

    let result = provider.close();
    assert_eq!(
        result,
        Err(HashProviderError::ProviderCloseFailed {
            status: NativeStatus::INVALID_HANDLE
        })
    );
    assert!(!provider.is_open());
    assert_eq!(provider.close(), Err(HashProviderError::AlreadyClosed));

    drop(provider);
    assert_eq!(probe.lock().closes, 1);
}

#[test]
fn test_drop_swallows_close_failure() {
    let (provider, probe) = open_counting(HashAlgorithm::Sha1);
    provider
        .native()
        .fail_at(FaultPoint::Close, NativeStatus::UNSUCCESSFUL);

    drop(provider);
    assert_eq!(probe.lock().closes, 1);
}

#[test]
fn test_open_failure_carries_status() {
    init_tracing();
    let native = CountingProvider::default();
    let probe = native.probe();
    native.fail_at(FaultPoint::Open, NativeStatus::NOT_FOUND);

    let result = AlgorithmProvider::open_with(native, ProviderOptions::hash(HashAlgorithm::Sha256));
    let error = result.unwrap_err();
    assert_eq!(
        error,
        HashProviderError::ProviderOpenFailed {
            algorithm: "SHA256".to_string(),
            status: NativeStatus::NOT_FOUND,
        }
    );
    assert_eq!(error.operation(), "open_provider");
    assert_eq!(error.status(), Some(NativeStatus::NOT_FOUND));

    let probe = probe.lock();
    assert_eq!(probe.opens, 1);
    assert_eq!(probe.closes, 0);
}

#[test]
fn test_open_unknown_algorithm_on_platform() {
    init_tracing();
    let result = AlgorithmProvider::open(ProviderOptions::new("NOT-AN-ALGORITHM"));
    assert!(matches!(
        result,
        Err(HashProviderError::ProviderOpenFailed { ref algorithm, .. }) if algorithm == "NOT-AN-ALGORITHM"
    ));
}

#[test]
fn test_open_with_implementation_name() {
    init_tracing();
    let options = ProviderOptions::hash(HashAlgorithm::Sha256).with_implementation(PRIMITIVE_PROVIDER);
    let provider = AlgorithmProvider::open(options).unwrap();
    assert_eq!(provider.implementation(), Some(PRIMITIVE_PROVIDER));
    provider.close().unwrap();
}

#[test]
fn test_unknown_flag_bits_pass_through() {
    init_tracing();
    let flags = OpenFlags::from_bits_retain(0x0001_0000) | OpenFlags::HASH_REUSABLE;
    assert_eq!(flags.bits(), 0x0001_0020);

    let native = CountingProvider::default();
    let probe = native.probe();
    let options = ProviderOptions::hash(HashAlgorithm::Sha256).with_flags(flags);
    // The platform may reject the unknown bit; only the hand-off matters here.
    let _ = AlgorithmProvider::open_with(native, options);

    assert_eq!(probe.lock().open_flags, Some(0x0001_0020));
}

#[test]
fn test_query_properties() {
    let (provider, probe) = open_counting(HashAlgorithm::Sha256);

    assert_eq!(provider.property_size(HASH_LENGTH).unwrap(), 4);
    assert_eq!(provider.digest_len().unwrap(), 32);
    assert!(provider.object_len().unwrap() > 0);

    let value = provider.query_property(HASH_LENGTH).unwrap();
    assert_eq!(value, 32u32.to_le_bytes());

    provider.close().unwrap();
    probe.lock().assert_balanced();
}

#[test]
fn test_query_unknown_property() {
    let (provider, _probe) = open_counting(HashAlgorithm::Sha256);

    let error = provider.query_property("NoSuchProperty").unwrap_err();
    assert!(matches!(
        error,
        HashProviderError::PropertyQueryFailed { ref property, .. } if property == "NoSuchProperty"
    ));
    assert_eq!(error.operation(), "get_property");
    assert!(error.status().is_some());
}

#[test]
fn test_query_property_value_phase_failure() {
    let (provider, _probe) = open_counting(HashAlgorithm::Sha512);
    provider.native().fail_at(
        FaultPoint::PropertyValue(HASH_LENGTH),
        NativeStatus::BUFFER_TOO_SMALL,
    );

    assert_eq!(
        provider.digest_len(),
        Err(HashProviderError::PropertyQueryFailed {
            property: HASH_LENGTH.to_string(),
            status: NativeStatus::BUFFER_TOO_SMALL,
        })
    );
    assert_eq!(provider.digest_len().unwrap(), 64);
}

#[test]
fn test_query_after_close_fails_fast() {
    let (provider, probe) = open_counting(HashAlgorithm::Sha256);
    provider.close().unwrap();

    assert_eq!(
        provider.query_property(HASH_LENGTH),
        Err(HashProviderError::HandleClosed {
            operation: "query_property"
        })
    );
    assert_eq!(
        provider.property_size(OBJECT_LENGTH),
        Err(HashProviderError::HandleClosed {
            operation: "property_size"
        })
    );
    assert_eq!(probe.lock().property_queries, 0);
}

#[test]
fn test_error_operation_names() {
    let closed = HashProviderError::HandleClosed { operation: "hash" };
    assert_eq!(closed.operation(), "hash");
    assert_eq!(closed.status(), None);
    assert_eq!(HashProviderError::AlreadyClosed.operation(), "close");

    let update = HashProviderError::HashUpdateFailed {
        status: NativeStatus::INVALID_HANDLE,
    };
    assert_eq!(update.operation(), "hash_data");
    assert_eq!(
        update.to_string(),
        "failed to append data to hash state: status 0xC0000008"
    );
}

#[test]
fn test_debug_shows_state() {
    let (provider, _probe) = open_counting(HashAlgorithm::Sha1);
    let open = format!("{provider:?}");
    assert!(open.contains("SHA1"));
    assert!(open.contains("open: true"));

    provider.close().unwrap();
    assert!(format!("{provider:?}").contains("open: false"));
}

#[test]
fn test_algorithm_identifiers() {
    let identifiers = ALGORITHMS.map(|algorithm| algorithm.to_string());
    assert_eq!(identifiers, ["SHA1", "SHA256", "SHA384", "SHA512"]);
    assert_eq!(
        ProviderOptions::hash(HashAlgorithm::Sha384).algorithm(),
        "SHA384"
    );
}
