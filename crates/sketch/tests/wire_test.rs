//! Sketches travel between replicas; make sure they survive the trip.

use corelib::hash::Xxh3Hasher;
use sketch::{BloomFilter, HyperLogLog};

#[test]
fn test_bloom_filter_survives_bincode() {
    let mut filter = BloomFilter::new(1_000, 0.01).unwrap();
    for i in 0..500u32 {
        filter.add(&i.to_be_bytes());
    }
    let bytes = bincode::serialize(&filter).unwrap();
    let restored: BloomFilter = bincode::deserialize(&bytes).unwrap();

    assert_eq!(restored, filter);
    assert!((0..500u32).all(|i| restored.contains(&i.to_be_bytes())));
}

#[test]
fn test_hyperloglog_survives_bincode() {
    let mut hll = HyperLogLog::new(10).unwrap();
    for i in 0..5_000u32 {
        hll.add(&i.to_be_bytes());
    }
    let bytes = bincode::serialize(&hll).unwrap();
    let restored: HyperLogLog = bincode::deserialize(&bytes).unwrap();

    assert_eq!(restored.estimate(), hll.estimate());
    assert_eq!(restored.merge(&hll).unwrap(), hll);
}

#[test]
fn test_bloom_filter_with_truncated_words_is_rejected() {
    let filter = BloomFilter::new(1_000, 0.01).unwrap();
    // Same layout as the struct, with the bit array cut to one word.
    let forged = bincode::serialize(&(
        vec![0u64; 1],
        filter.num_bits(),
        filter.num_hashes(),
        filter.capacity(),
        filter.error_rate(),
        0usize,
        Xxh3Hasher::default(),
    ))
    .unwrap();

    let err = bincode::deserialize::<BloomFilter>(&forged).unwrap_err();
    assert!(err.to_string().contains("malformed sketch"), "{}", err);
}

#[test]
fn test_bloom_filter_with_zero_bits_is_rejected() {
    let forged = bincode::serialize(&(
        Vec::<u64>::new(),
        0u64,
        1u32,
        10usize,
        0.01f64,
        0usize,
        Xxh3Hasher::default(),
    ))
    .unwrap();
    assert!(bincode::deserialize::<BloomFilter>(&forged).is_err());
}

#[test]
fn test_hyperloglog_with_bad_precision_is_rejected() {
    let hll = HyperLogLog::new(10).unwrap();
    let mut bytes = bincode::serialize(&hll).unwrap();
    bytes[0] = 0;

    let err = bincode::deserialize::<HyperLogLog>(&bytes).unwrap_err();
    assert!(err.to_string().contains("precision 0"), "{}", err);
}

#[test]
fn test_hyperloglog_with_short_registers_is_rejected() {
    let forged = bincode::serialize(&(12u8, vec![0u8; 16], Xxh3Hasher::default())).unwrap();
    let err = bincode::deserialize::<HyperLogLog>(&forged).unwrap_err();
    assert!(err.to_string().contains("register count"), "{}", err);
}
