//! Integration tests for the parallel Encryptor/Decryptor facade.
//!
//! Covers round trips across thread counts and layouts, thread-count
//! invariance, size prediction, and the 10 MB reference scenario.

use proptest::prelude::*;
use salmon_crypto::{
    actual_size, Decryptor, EncryptionFormat, EncryptionKey, EncryptionMode, Encryptor, HashKey,
    Nonce, ProviderType, DEFAULT_CHUNK_SIZE, HEADER_LENGTH,
};

const NONCE: Nonce = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

fn key() -> EncryptionKey {
    EncryptionKey::from_bytes([0x5A; 32])
}

fn hash_key() -> HashKey {
    HashKey::from_bytes([0xA5; 32])
}

/// Deterministic pseudo-random bytes (xorshift).
fn make_data(size: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..size)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect()
}

struct Layout {
    format: EncryptionFormat,
    integrity: bool,
    chunk_size: Option<u32>,
}

const LAYOUTS: [Layout; 4] = [
    Layout { format: EncryptionFormat::Salmon, integrity: true, chunk_size: Some(4096) },
    Layout { format: EncryptionFormat::Salmon, integrity: false, chunk_size: None },
    Layout { format: EncryptionFormat::Generic, integrity: true, chunk_size: Some(1024) },
    Layout { format: EncryptionFormat::Generic, integrity: false, chunk_size: None },
];

fn round_trip(data: &[u8], threads: usize, layout: &Layout) -> Vec<u8> {
    let hk = hash_key();
    let hash_key = layout.integrity.then_some(&hk);
    let ct = Encryptor::new(threads)
        .unwrap()
        .encrypt(data, &key(), &NONCE, layout.format, layout.integrity, hash_key, layout.chunk_size)
        .unwrap();
    Decryptor::new(threads)
        .unwrap()
        .decrypt(&ct, &key(), Some(&NONCE), layout.format, layout.integrity, hash_key, layout.chunk_size)
        .unwrap()
}

#[test]
fn round_trip_across_threads_and_layouts() {
    let data = make_data(100_003, 7);
    for layout in &LAYOUTS {
        for threads in [1, 2, 4, 8] {
            assert_eq!(round_trip(&data, threads, layout), data, "threads={threads}");
        }
    }
}

#[test]
fn thread_count_does_not_change_ciphertext() {
    let data = make_data(300_000, 11);
    let hk = hash_key();
    let encrypt = |threads: usize| {
        Encryptor::new(threads)
            .unwrap()
            .encrypt(&data, &key(), &NONCE, EncryptionFormat::Salmon, true, Some(&hk), Some(16 * 1024))
            .unwrap()
    };
    let single = encrypt(1);
    assert_eq!(single, encrypt(8));
    assert_eq!(single, encrypt(3));

    let decrypt = |threads: usize| {
        Decryptor::new(threads)
            .unwrap()
            .decrypt(&single, &key(), None, EncryptionFormat::Salmon, true, Some(&hk), None)
            .unwrap()
    };
    assert_eq!(decrypt(1), data);
    assert_eq!(decrypt(8), data);
}

#[test]
fn backends_produce_identical_ciphertext() {
    let data = make_data(70_000, 3);
    let hk = hash_key();
    let encrypt = |provider: ProviderType| {
        Encryptor::new(4)
            .unwrap()
            .with_provider(provider)
            .encrypt(&data, &key(), &NONCE, EncryptionFormat::Salmon, true, Some(&hk), Some(8192))
            .unwrap()
    };
    let reference = encrypt(ProviderType::Default);
    assert_eq!(reference, encrypt(ProviderType::Ctr));

    let back = Decryptor::new(2)
        .unwrap()
        .with_provider(ProviderType::Ctr)
        .decrypt(&reference, &key(), None, EncryptionFormat::Salmon, true, Some(&hk), None)
        .unwrap();
    assert_eq!(back, data);
}

#[test]
fn buffer_size_does_not_change_ciphertext() {
    let data = make_data(50_000, 5);
    let hk = hash_key();
    let encrypt = |buffer_size: usize| {
        Encryptor::new(2)
            .unwrap()
            .with_buffer_size(buffer_size)
            .encrypt(&data, &key(), &NONCE, EncryptionFormat::Salmon, true, Some(&hk), Some(2048))
            .unwrap()
    };
    assert_eq!(encrypt(2048), encrypt(1 << 20));
    assert_eq!(encrypt(100), encrypt(4096));
}

#[test]
fn ten_megabyte_scenario() {
    let data = make_data(10_000_000, 42);
    let hk = hash_key();
    let chunk = DEFAULT_CHUNK_SIZE;

    let ct = Encryptor::new(4)
        .unwrap()
        .encrypt(&data, &key(), &NONCE, EncryptionFormat::Salmon, true, Some(&hk), Some(chunk))
        .unwrap();
    let hashes = 10_000_000usize.div_ceil(chunk as usize) * 32;
    assert_eq!(ct.len(), 10_000_000 + HEADER_LENGTH + hashes);

    let pt = Decryptor::new(4)
        .unwrap()
        .decrypt(&ct, &key(), None, EncryptionFormat::Salmon, true, Some(&hk), None)
        .unwrap();
    assert_eq!(pt.len(), 10_000_000);
    assert!(pt == data);
}

#[test]
fn default_chunk_size_applies_when_only_integrity_is_requested() {
    let data = make_data(1000, 9);
    let hk = hash_key();
    let ct = Encryptor::new(1)
        .unwrap()
        .encrypt(&data, &key(), &NONCE, EncryptionFormat::Salmon, true, Some(&hk), None)
        .unwrap();
    assert_eq!(&ct[4..8], &DEFAULT_CHUNK_SIZE.to_be_bytes());
    assert_eq!(ct.len(), HEADER_LENGTH + 1000 + 32);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn predicted_size_matches_real_output(
        len in 0usize..20_000,
        chunk_blocks in 0u32..64,
        header in any::<bool>(),
        threads in 1usize..5,
    ) {
        let data = make_data(len, len as u64);
        let chunk_size = chunk_blocks * 16;
        let integrity = chunk_size > 0;
        let hk = hash_key();
        let format = if header { EncryptionFormat::Salmon } else { EncryptionFormat::Generic };
        let hash_key = integrity.then_some(&hk);

        let ct = Encryptor::new(threads)
            .unwrap()
            .encrypt(&data, &key(), &NONCE, format, integrity, hash_key, Some(chunk_size))
            .unwrap();
        prop_assert_eq!(
            ct.len() as u64,
            actual_size(EncryptionMode::Encrypt, len as u64, header, chunk_size)
        );
        prop_assert_eq!(
            actual_size(EncryptionMode::Decrypt, ct.len() as u64, header, chunk_size),
            len as u64
        );

        let pt = Decryptor::new(threads)
            .unwrap()
            .decrypt(&ct, &key(), Some(&NONCE), format, integrity, hash_key, Some(chunk_size))
            .unwrap();
        prop_assert_eq!(pt, data);
    }
}
