use super::*;
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::runtime::SerialRunner;
use crate::types::{ElementKind, TypedBuffer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// An engine that parallelizes even tiny inputs over four workers.
fn eager_engine(chunk_size: usize) -> Engine {
    Engine::new(KernelConfig {
        chunk_size,
        parallel_threshold: 0,
        num_threads: Some(4),
        ..Default::default()
    })
    .unwrap()
}

fn serial_engine() -> Engine {
    Engine::with_runner(
        KernelConfig::single_threaded(),
        Box::new(SerialRunner::new(64)),
    )
    .unwrap()
}

#[test]
fn test_compact_selects_first_and_last() {
    let values = [10i32, 20, 30];
    let mask = [1u8, 0, 1];
    let out = serial_engine()
        .compact(
            &TypedBuffer::from_slice(&values, ElementKind::Int32).unwrap(),
            &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
        )
        .unwrap();
    assert_eq!(out.to_vec::<i32>().unwrap(), vec![10, 30]);
}

#[test]
fn test_gather_signed_bytes_with_override() {
    let values = [10i8, 20, 30];
    let indices = [-1i8, 5, 1];
    let out = eager_engine(8)
        .gather(
            &TypedBuffer::from_slice(&values, ElementKind::Int8).unwrap(),
            &TypedBuffer::from_slice(&indices, ElementKind::Int8).unwrap(),
            Some(&(-1i8).to_ne_bytes()),
        )
        .unwrap();
    assert_eq!(out.to_vec::<i8>().unwrap(), vec![30, -1, 20]);
}

#[test]
fn test_compact_empty_mask() {
    let values: [f32; 0] = [];
    for engine in [serial_engine(), eager_engine(8)] {
        let out = engine
            .compact(
                &TypedBuffer::from_slice(&values, ElementKind::Float32).unwrap(),
                &TypedBuffer::from_bytes(&[], ElementKind::Bool).unwrap(),
            )
            .unwrap();
        assert!(out.is_empty());
        assert!(out.as_bytes().is_empty());
    }
}

#[test]
fn test_compact_length_mismatch_is_rejected() {
    let values = [1u64, 2, 3];
    let mask = [1u8, 1];
    let result = eager_engine(8).compact(
        &TypedBuffer::from_slice(&values, ElementKind::UInt64).unwrap(),
        &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
    );
    match result {
        Err(KernelError::InvalidArgument(msg)) => {
            assert!(msg.contains('2') && msg.contains('3'), "{}", msg)
        }
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
}

#[test]
fn test_gather_unsupported_index_kind_names_the_combination() {
    let values = [1u16, 2];
    let indices = [0u16, 1];
    let result = serial_engine().gather(
        &TypedBuffer::from_slice(&values, ElementKind::UInt16).unwrap(),
        &TypedBuffer::from_slice(&indices, ElementKind::Float16).unwrap(),
        None,
    );
    match result {
        Err(KernelError::UnsupportedType(msg)) => {
            assert!(msg.contains("float16") && msg.contains("2-byte"), "{}", msg)
        }
        other => panic!("expected UnsupportedType, got {:?}", other),
    }
}

#[test]
fn test_compact_is_stable_and_counts_match() {
    let mut rng = StdRng::seed_from_u64(2024);
    let values: Vec<u32> = (0..200_000).collect();
    let mask: Vec<u8> = (0..values.len())
        .map(|_| if rng.random_bool(0.25) { rng.random_range(1..=255) } else { 0 })
        .collect();
    let engine = eager_engine(4096);
    let mask_view = TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap();

    let out = engine
        .compact(
            &TypedBuffer::from_slice(&values, ElementKind::UInt32).unwrap(),
            &mask_view,
        )
        .unwrap();
    assert_eq!(out.len(), engine.count_nonzero(&mask_view).unwrap());
    assert_eq!(out.len(), count_nonzero(&mask));

    // Values are their own positions, so stability means strictly increasing.
    let selected = out.to_vec::<u32>().unwrap();
    assert!(selected.windows(2).all(|w| w[0] < w[1]));
    assert!(selected.iter().all(|&v| mask[v as usize] != 0));
}

#[test]
fn test_compact_identical_across_engines() {
    let mut rng = StdRng::seed_from_u64(77);
    let bytes: Vec<u8> = (0..30_000 * 12).map(|_| rng.random()).collect();
    let mask: Vec<u8> = (0..30_000).map(|_| rng.random_bool(0.6) as u8).collect();
    let values = TypedBuffer::from_bytes(&bytes, ElementKind::Opaque(12)).unwrap();
    let mask_view = TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap();

    let baseline = serial_engine().compact(&values, &mask_view).unwrap();
    for chunk_size in [8, 256, 16_384] {
        let out = eager_engine(chunk_size).compact(&values, &mask_view).unwrap();
        assert_eq!(out, baseline, "chunk_size {}", chunk_size);
    }
}

#[test]
fn test_compact_all_true_returns_values() {
    let values: Vec<f64> = (0..10_000).map(|i| i as f64 / 3.0).collect();
    let mask = vec![1u8; values.len()];
    let out = eager_engine(512)
        .compact(
            &TypedBuffer::from_slice(&values, ElementKind::Float64).unwrap(),
            &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
        )
        .unwrap();
    assert_eq!(out.to_vec::<f64>().unwrap(), values);
}

#[test]
fn test_gather_signed_boundaries() {
    let values = [1i16, 2, 3, 4, 5];
    let indices = [-5i64, -6, 4, 5, -1];
    let out = serial_engine()
        .gather(
            &TypedBuffer::from_slice(&values, ElementKind::Int16).unwrap(),
            &TypedBuffer::from_slice(&indices, ElementKind::Int64).unwrap(),
            None,
        )
        .unwrap();
    assert_eq!(
        out.to_vec::<i16>().unwrap(),
        vec![1, i16::MIN, 5, i16::MIN, 5]
    );
}

#[test]
fn test_gather_unsigned_boundaries() {
    let values = [1i16, 2, 3, 4, 5];
    let indices = [4u16, 5, u16::MAX, 0];
    let out = serial_engine()
        .gather(
            &TypedBuffer::from_slice(&values, ElementKind::Int16).unwrap(),
            &TypedBuffer::from_slice(&indices, ElementKind::UInt16).unwrap(),
            None,
        )
        .unwrap();
    assert_eq!(out.to_vec::<i16>().unwrap(), vec![5, i16::MIN, i16::MIN, 1]);
}

#[test]
fn test_gather_complex_default_is_nan_pair() {
    let values = [[1.0f32, -1.0], [2.0, -2.0]];
    let indices = [1u8, 3];
    let out = serial_engine()
        .gather(
            &TypedBuffer::from_slice(&values, ElementKind::Complex64).unwrap(),
            &TypedBuffer::from_slice(&indices, ElementKind::UInt8).unwrap(),
            None,
        )
        .unwrap();
    let result = out.to_vec::<[f32; 2]>().unwrap();
    assert_eq!(result[0], [2.0, -2.0]);
    assert!(result[1][0].is_nan() && result[1][1].is_nan());
}

#[test]
fn test_gather_into_compacted_output() {
    let values: Vec<i64> = (0..1000).map(|v| v * v).collect();
    let mask: Vec<u8> = (0..1000).map(|i| (i % 10 == 0) as u8).collect();
    let engine = eager_engine(64);

    let selected = engine
        .compact(
            &TypedBuffer::from_slice(&values, ElementKind::Int64).unwrap(),
            &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
        )
        .unwrap();
    assert_eq!(selected.len(), 100);

    let indices: Vec<i32> = vec![0, 99, -100, 100, -101];
    let picked = engine
        .gather(
            &selected.as_view(),
            &TypedBuffer::from_slice(&indices, ElementKind::Int32).unwrap(),
            None,
        )
        .unwrap();
    assert_eq!(
        picked.to_vec::<i64>().unwrap(),
        vec![0, 990 * 990, 0, i64::MIN, i64::MIN]
    );
}
