//! Criterion benchmarks for grove-rf: forest training and prediction.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use grove_rf::{ColumnSpec, ForestConfig, Matrix, MaxFeatures};

fn make_classification(
    n_rows: usize,
    n_features: usize,
    n_classes: usize,
    seed: u64,
) -> (Matrix, ColumnSpec) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(n_rows * (n_features + 1));
    for i in 0..n_rows {
        let class = i % n_classes;
        for f in 0..n_features {
            let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
            data.push(base + rng.r#gen::<f64>() * 0.5);
        }
        data.push(class as f64);
    }
    let matrix = Matrix::from_vec(data, n_rows, n_features + 1).unwrap();
    let raw: Vec<i64> = (0..n_features as i64).collect();
    let spec = ColumnSpec::resolve(&raw, -1, n_features + 1).unwrap();
    (matrix, spec)
}

fn bench_forest_train(c: &mut Criterion) {
    let (matrix, spec) = make_classification(500, 20, 5, 42);
    let rows: Vec<usize> = (0..matrix.rows()).collect();
    let cfg = ForestConfig::new(50)
        .unwrap()
        .with_max_features(MaxFeatures::Sqrt)
        .with_seed(42);

    c.bench_function("forest_train_500x20_5class_50trees", |b| {
        b.iter(|| cfg.fit(&matrix, &spec, &rows).unwrap());
    });
}

fn bench_forest_predict_rows(c: &mut Criterion) {
    let (matrix, spec) = make_classification(500, 20, 5, 42);
    let rows: Vec<usize> = (0..matrix.rows()).collect();
    let cfg = ForestConfig::new(50)
        .unwrap()
        .with_max_features(MaxFeatures::Sqrt)
        .with_seed(42);
    let forest = cfg.fit(&matrix, &spec, &rows).unwrap();

    c.bench_function("forest_predict_rows_500x20_50trees", |b| {
        b.iter(|| forest.predict_rows(&matrix, &rows).unwrap());
    });
}

criterion_group!(benches, bench_forest_train, bench_forest_predict_rows);
criterion_main!(benches);
