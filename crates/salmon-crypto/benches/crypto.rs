use std::io::{Cursor, Read, Seek, SeekFrom};

use salmon_crypto::{
    create_transformer, AesStream, Decryptor, EncryptionFormat, EncryptionKey, Encryptor, HashKey,
    ProviderType, StreamOptions,
};

const NONCE: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn key() -> EncryptionKey {
    EncryptionKey::from_bytes([0x42; 32])
}

fn hash_key() -> HashKey {
    HashKey::from_bytes([0x24; 32])
}

#[divan::bench(args = [ProviderType::Default, ProviderType::Ctr])]
fn bench_transformer(bencher: divan::Bencher, provider: ProviderType) {
    let size = 1 << 20;
    let data = make_data(size);
    let mut out = vec![0u8; size];
    let mut transformer = create_transformer(provider);
    transformer.init(&key(), &NONCE).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench_local(|| {
            transformer.reset_counter().unwrap();
            transformer
                .encrypt_block(divan::black_box(&data), &mut out)
                .unwrap()
        });
}

#[divan::bench(args = [1, 2, 4, 8])]
fn bench_encrypt_threads(bencher: divan::Bencher, threads: usize) {
    let size = 8 << 20;
    let data = make_data(size);
    let encryptor = Encryptor::new(threads).unwrap();
    let hk = hash_key();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            encryptor
                .encrypt(
                    divan::black_box(&data),
                    &key(),
                    &NONCE,
                    EncryptionFormat::Salmon,
                    true,
                    Some(&hk),
                    None,
                )
                .unwrap()
        });
}

#[divan::bench(args = [1, 4])]
fn bench_decrypt_threads(bencher: divan::Bencher, threads: usize) {
    let size = 8 << 20;
    let data = make_data(size);
    let hk = hash_key();
    let encrypted = Encryptor::new(4)
        .unwrap()
        .encrypt(&data, &key(), &NONCE, EncryptionFormat::Salmon, true, Some(&hk), None)
        .unwrap();
    let decryptor = Decryptor::new(threads).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            decryptor
                .decrypt(
                    divan::black_box(&encrypted),
                    &key(),
                    None,
                    EncryptionFormat::Salmon,
                    true,
                    Some(&hk),
                    None,
                )
                .unwrap()
        });
}

#[divan::bench(args = [4096, 65536, 262144])]
fn bench_random_read(bencher: divan::Bencher, chunk_size: u32) {
    let data = make_data(4 << 20);
    let options = StreamOptions::default().with_integrity(hash_key(), Some(chunk_size));
    let encrypted = Encryptor::new(1)
        .unwrap()
        .encrypt(&data, &key(), &NONCE, EncryptionFormat::Salmon, true, Some(&hash_key()), Some(chunk_size))
        .unwrap();
    let mut reader = AesStream::reader(Cursor::new(encrypted), &key(), None, options).unwrap();
    let mut buf = [0u8; 512];
    bencher
        .counter(divan::counter::BytesCount::new(buf.len()))
        .bench_local(|| {
            reader.seek(SeekFrom::Start(1_234_567)).unwrap();
            reader.read_exact(&mut buf).unwrap();
        });
}

fn main() {
    divan::main();
}
