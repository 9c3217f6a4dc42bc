//! Behavioral properties of the vector index, checked for every precision.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sercha_vector::vector::codec::{dequantize_i8, f16_to_f32, f32_to_f16, quantize_i8};
use sercha_vector::{Precision, SearchHit, VectorError, VectorIndexEngine};
use tempfile::TempDir;

fn random_vectors(seed: u64, count: usize, dimension: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            (0..dimension)
                .map(|_| rng.random_range(-1.0f32..1.0))
                .collect()
        })
        .collect()
}

/// Similarity a reopened index must reach for a vector queried with itself.
fn reopen_tolerance(precision: Precision) -> f32 {
    match precision {
        Precision::Float32 => 1e-5,
        Precision::Float16 => 1e-3,
        Precision::Int8 => 1e-2,
    }
}

fn create(dir: &TempDir, dimension: usize, capacity: u64, precision: Precision) -> VectorIndexEngine {
    VectorIndexEngine::create(dir.path().join("vectors"), dimension, capacity, precision).unwrap()
}

#[test]
fn test_self_similarity() {
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let engine = create(&dir, 8, 64, precision);
        let vectors = random_vectors(1, 30, 8);
        for (i, vector) in vectors.iter().enumerate() {
            engine.add(&format!("chunk-{i}"), vector).unwrap();
        }

        for (i, vector) in vectors.iter().enumerate() {
            let hits = engine.search(vector, 1).unwrap();
            assert_eq!(hits[0].id, format!("chunk-{i}"), "{precision}");
            assert!((hits[0].similarity - 1.0).abs() < 1e-4, "{precision}");
        }
    }
}

#[test]
fn test_deleted_ids_never_returned() {
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let engine = create(&dir, 4, 32, precision);
        let vectors = random_vectors(2, 20, 4);
        for (i, vector) in vectors.iter().enumerate() {
            engine.add(&format!("id-{i}"), vector).unwrap();
        }
        let deleted: Vec<String> = (0..20).step_by(4).map(|i| format!("id-{i}")).collect();
        for id in &deleted {
            engine.delete(id).unwrap();
        }

        let check = |engine: &VectorIndexEngine| {
            for query in vectors.iter().chain(random_vectors(3, 20, 4).iter()) {
                let hits = engine.search(query, 20).unwrap();
                assert_eq!(hits.len(), 15, "{precision}");
                assert!(
                    hits.iter().all(|hit| !deleted.contains(&hit.id)),
                    "{precision}: deleted id returned"
                );
            }
        };
        check(&engine);

        engine.close().unwrap();
        let reopened = VectorIndexEngine::open(dir.path().join("vectors"), 4).unwrap();
        check(&reopened);
    }
}

fn assert_ranked(hits: &[SearchHit], expected: usize, context: &str) {
    assert_eq!(hits.len(), expected, "{context}");
    assert!(
        hits.windows(2).all(|pair| pair[0].similarity >= pair[1].similarity),
        "{context}: hits out of order"
    );
}

#[test]
fn test_search_with_k_at_least_live_count() {
    const COUNT: usize = 30;
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors");
        let engine = VectorIndexEngine::create(&path, 4, 8, precision).unwrap();
        let vectors = random_vectors(8, COUNT, 4);
        for (i, vector) in vectors.iter().enumerate() {
            engine.add(&format!("item-{i}"), vector).unwrap();
        }

        let check = |engine: &VectorIndexEngine, stage: &str| {
            for query in vectors.iter().chain(random_vectors(9, 10, 4).iter()) {
                for k in [COUNT, COUNT + 1, COUNT + 10] {
                    let hits = engine.search(query, k).unwrap();
                    assert_ranked(&hits, COUNT, &format!("{precision} {stage} k={k}"));
                }
            }
        };
        check(&engine, "in memory");

        engine.close().unwrap();
        let reopened = VectorIndexEngine::open(&path, 4).unwrap();
        check(&reopened, "reopened");
    }
}

#[test]
fn test_search_after_heavy_deletes() {
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors");
        let engine = VectorIndexEngine::create(&path, 4, 16, precision).unwrap();
        let vectors = random_vectors(10, 120, 4);
        for (i, vector) in vectors.iter().enumerate() {
            engine.add(&format!("item-{i}"), vector).unwrap();
        }
        // Deletes outnumber the default search breadth and the survivors.
        for i in (0..120).filter(|i| i % 3 != 0) {
            engine.delete(&format!("item-{i}")).unwrap();
        }
        assert_eq!(engine.stats().unwrap().live, 40);

        let check = |engine: &VectorIndexEngine, stage: &str| {
            for query in vectors.iter().step_by(7) {
                for k in [1, 40, 100] {
                    let hits = engine.search(query, k).unwrap();
                    assert_ranked(&hits, k.min(40), &format!("{precision} {stage} k={k}"));
                    for hit in &hits {
                        let index: usize = hit.id["item-".len()..].parse().unwrap();
                        assert_eq!(index % 3, 0, "{precision} {stage}: deleted {} returned", hit.id);
                    }
                }
            }
        };
        check(&engine, "in memory");

        engine.close().unwrap();
        let reopened = VectorIndexEngine::open(&path, 4).unwrap();
        assert_eq!(reopened.stats().unwrap().live, 40);
        check(&reopened, "reopened");
    }
}

#[test]
fn test_delete_unknown_id_is_noop() {
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let engine = create(&dir, 4, 8, precision);
        engine.add("kept", &[1.0, 2.0, 3.0, 4.0]).unwrap();

        engine.delete("never-added").unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.live, 1);
        assert_eq!(stats.tombstoned, 0);
        assert_eq!(engine.search(&[1.0, 2.0, 3.0, 4.0], 5).unwrap().len(), 1);
    }
}

#[test]
fn test_dimension_guard() {
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let engine = create(&dir, 4, 8, precision);
        engine.add("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();

        for bad in [vec![], vec![1.0; 3], vec![1.0; 5]] {
            assert!(matches!(
                engine.add("b", &bad),
                Err(VectorError::DimensionMismatch { .. })
            ));
            assert!(matches!(
                engine.search(&bad, 1),
                Err(VectorError::DimensionMismatch { .. })
            ));
        }
        assert_eq!(engine.stats().unwrap().live, 1);
    }
}

#[test]
fn test_round_trip_persistence() {
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors");
        let vectors = random_vectors(4, 100, 4);

        let engine = VectorIndexEngine::create(&path, 4, 128, precision).unwrap();
        for (i, vector) in vectors.iter().enumerate() {
            engine.add(&format!("doc-{i}"), vector).unwrap();
        }
        engine.close().unwrap();

        let reopened = VectorIndexEngine::open(&path, 4).unwrap();
        assert_eq!(reopened.precision(), precision);
        for (i, vector) in vectors.iter().enumerate() {
            let hits = reopened.search(vector, 1).unwrap();
            assert_eq!(hits[0].id, format!("doc-{i}"), "{precision}");
            assert!(
                1.0 - hits[0].similarity <= reopen_tolerance(precision),
                "{precision}: similarity {}",
                hits[0].similarity
            );
        }
    }
}

#[test]
fn test_capacity_growth() {
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors");
        let engine = VectorIndexEngine::create(&path, 4, 1, precision).unwrap();
        let vectors = random_vectors(5, 10, 4);
        for (i, vector) in vectors.iter().enumerate() {
            engine.add(&format!("v{i}"), vector).unwrap();
        }

        assert_eq!(engine.stats().unwrap().live, 10);
        assert!(engine.stats().unwrap().capacity >= 10);
        for (i, vector) in vectors.iter().enumerate() {
            assert_eq!(engine.search(vector, 1).unwrap()[0].id, format!("v{i}"));
        }

        engine.close().unwrap();
        let reopened = VectorIndexEngine::open(&path, 4).unwrap();
        assert_eq!(reopened.stats().unwrap().live, 10);
    }
}

#[test]
fn test_orthogonal_vectors() {
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let engine = create(&dir, 4, 8, precision);
        engine.add("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        engine.add("b", &[0.0, 1.0, 0.0, 0.0]).unwrap();

        let hits = engine.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
        assert!(hits[1].similarity.abs() < 1e-5);
    }
}

#[test]
fn test_quantization_bound() {
    for (seed, vector) in random_vectors(6, 200, 16).into_iter().enumerate() {
        let scaled: Vec<f32> = vector.iter().map(|v| v * (seed as f32 + 1.0)).collect();
        let (quantized, scale) = quantize_i8(&scaled);
        let max_abs = scaled.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        let expected_scale = max_abs / 127.0;

        for (original, restored) in scaled.iter().zip(dequantize_i8(&quantized, scale)) {
            assert!((original - restored).abs() <= expected_scale * 0.5001);
        }
    }
}

#[test]
fn test_half_precision_round_trip() {
    let mut rng = StdRng::seed_from_u64(7);
    let bound = 2.0f32.powi(-10);
    for _ in 0..10_000 {
        let value = rng.random_range(-60_000.0f32..60_000.0);
        if value.abs() < 2.0f32.powi(-14) {
            continue;
        }
        let restored = f16_to_f32(f32_to_f16(value));
        assert!(((restored - value) / value).abs() <= bound, "{value} -> {restored}");
    }

    assert_eq!(f16_to_f32(f32_to_f16(0.0)).to_bits(), 0.0f32.to_bits());
    assert_eq!(f16_to_f32(f32_to_f16(-0.0)).to_bits(), (-0.0f32).to_bits());
    assert_eq!(f16_to_f32(f32_to_f16(f32::INFINITY)), f32::INFINITY);
    assert_eq!(f16_to_f32(f32_to_f16(f32::NEG_INFINITY)), f32::NEG_INFINITY);
    assert!(f16_to_f32(f32_to_f16(f32::NAN)).is_nan());
    assert!(f16_to_f32(f32_to_f16(-f32::NAN)).is_sign_negative());
}

#[test]
fn test_update_survives_reopen() {
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors");
        let engine = VectorIndexEngine::create(&path, 4, 4, precision).unwrap();
        engine.add("doc", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        engine.add("other", &[0.0, 1.0, 0.0, 0.0]).unwrap();
        engine.add("doc", &[0.0, 0.0, 1.0, 0.0]).unwrap();
        engine.close().unwrap();

        let reopened = VectorIndexEngine::open(&path, 4).unwrap();
        let stats = reopened.stats().unwrap();
        assert_eq!(stats.next_label, 3);
        assert_eq!(stats.live, 2);
        assert_eq!(stats.tombstoned, 1);

        let hits = reopened.search(&[0.0, 0.0, 1.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "doc");
        assert!((hits[0].similarity - 1.0).abs() < 1e-3);
    }
}

#[test]
fn test_open_with_wrong_dimension_fails() {
    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors");
        let engine = VectorIndexEngine::create(&path, 4, 4, precision).unwrap();
        engine.add("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        engine.close().unwrap();

        let result = VectorIndexEngine::open(&path, 8);
        assert!(
            matches!(result, Err(VectorError::Corrupted { .. })),
            "{precision}: {result:?}"
        );
    }
}
