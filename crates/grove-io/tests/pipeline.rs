//! End-to-end integration tests: CSV -> options -> resolve -> cross-validate.

use std::io::Write;

use grove_io::{Dim, MatrixReader, Options, ParsePolicy};
use grove_rf::{ColumnSpec, CrossValidation, ForestConfig, Matrix};
use tempfile::NamedTempFile;

fn write_file(content: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.flush().unwrap();
    f
}

/// A separable 3-column dataset with `per_class` rows per binary class.
fn separable_csv(per_class: usize) -> String {
    let mut csv = String::from("f0,f1,label\n");
    for i in 0..per_class {
        csv.push_str(&format!("{}.0,0.5,0\n", i));
    }
    for i in 0..per_class {
        csv.push_str(&format!("{}.0,0.5,1\n", 40 + i));
    }
    csv
}

#[test]
fn csv_to_cross_validated_accuracy() {
    // 1. Load the matrix (two-pass: dims, then values).
    let data_file = write_file(&separable_csv(20));
    let reader = MatrixReader::new(data_file.path());
    let dim = reader.read_dims().unwrap();
    assert_eq!(dim, Dim { rows: 40, cols: 3 });
    let matrix = reader.read().unwrap();

    // 2. Parse options and resolve columns against the loaded width.
    let opts_file = write_file(
        "n_estimators=10\n\
         max_depth=3\n\
         include_columns=0:1\n\
         target_column=-1\n",
    );
    let opts = Options::from_file(opts_file.path()).unwrap();
    let spec = ColumnSpec::resolve(&opts.include_columns, opts.target_column, matrix.cols())
        .unwrap();
    assert_eq!(spec.feature_columns(), &[0, 1]);
    assert_eq!(spec.target_column(), 2);

    // 3. Cross-validate.
    let config = ForestConfig::new(opts.n_estimators)
        .unwrap()
        .with_max_depth(opts.max_depth)
        .with_min_samples_leaf(opts.min_samples_leaf)
        .with_max_features(opts.max_features)
        .with_seed(42);
    let cv = CrossValidation::new(5).unwrap().with_seed(42);
    let result = cv.evaluate(&config, &matrix, &spec).unwrap();

    assert_eq!(result.fold_scores.len(), 5);
    assert!((0.0..=1.0).contains(&result.mean_score));
    // The classes are far apart; the folds should classify cleanly.
    assert!(result.mean_score > 0.9, "mean = {}", result.mean_score);
    assert_eq!(result.mean_score_percent(), 100.0);
}

#[test]
fn ten_row_scenario_resolves_and_evaluates() {
    // 10-row, 3-column dataset; target_column = -1, include_columns = 0:1.
    let data_file = write_file(&separable_csv(5));
    let reader = MatrixReader::new(data_file.path());
    assert_eq!(reader.read_dims().unwrap(), Dim { rows: 10, cols: 3 });
    let matrix = reader.read().unwrap();

    let spec = ColumnSpec::resolve(&[0, 1], -1, matrix.cols()).unwrap();
    assert_eq!(spec.feature_columns(), &[0, 1]);
    assert_eq!(spec.target_column(), 2);

    // k=2 on the small set: the mean score must be computable and in [0, 1].
    let config = ForestConfig::new(1)
        .unwrap()
        .with_max_depth(Some(1))
        .with_seed(42);
    let cv = CrossValidation::new(2).unwrap().with_seed(42);
    let result = cv.evaluate(&config, &matrix, &spec).unwrap();
    assert!((0.0..=1.0).contains(&result.mean_score));
}

#[test]
fn ragged_csv_fails_before_training() {
    let data_file = write_file("a,b,c\n1,2,3\n4,5,6,7\n8,9,10\n");
    let err = MatrixReader::new(data_file.path()).read().unwrap_err();
    assert!(matches!(
        err,
        grove_io::IoError::RaggedRow { line: 3, expected: 3, got: 4, .. }
    ));
}

#[test]
fn presupplied_dims_skip_the_counting_pass() {
    let data_file = write_file(&separable_csv(5));
    let matrix = MatrixReader::new(data_file.path())
        .with_dims(Dim { rows: 10, cols: 3 })
        .read()
        .unwrap();
    assert_eq!(matrix.rows(), 10);
    assert_eq!(matrix.cols(), 3);
}

#[test]
fn lenient_tokens_flow_through_to_training() {
    // One malformed feature token degrades to 0.0 but training proceeds.
    let mut csv = separable_csv(5);
    csv = csv.replacen("0.0,0.5,0", "oops,0.5,0", 1);
    let data_file = write_file(&csv);
    let matrix = MatrixReader::new(data_file.path()).read().unwrap();
    assert_eq!(matrix.get(0, 0), 0.0);

    let spec = ColumnSpec::resolve(&[0, 1], -1, matrix.cols()).unwrap();
    let rows: Vec<usize> = (0..matrix.rows()).collect();
    let forest = ForestConfig::new(5)
        .unwrap()
        .with_seed(42)
        .fit(&matrix, &spec, &rows)
        .unwrap();
    assert_eq!(forest.n_trees(), 5);
}

#[test]
fn strict_tokens_abort_the_pipeline() {
    let mut csv = separable_csv(5);
    csv = csv.replacen("0.0,0.5,0", "oops,0.5,0", 1);
    let data_file = write_file(&csv);
    let err = MatrixReader::new(data_file.path())
        .with_policy(ParsePolicy::Strict)
        .read()
        .unwrap_err();
    assert!(matches!(err, grove_io::IoError::InvalidNumeric { .. }));
}

#[test]
fn loaded_matrix_round_trips_row_major() {
    let data_file = write_file("a,b\n1,2\n3,4\n5,6\n");
    let matrix = MatrixReader::new(data_file.path()).read().unwrap();
    let flattened: Vec<f64> = (0..matrix.rows())
        .flat_map(|i| matrix.row(i).to_vec())
        .collect();
    assert_eq!(flattened, matrix.as_slice());
    let rebuilt = Matrix::from_vec(flattened, matrix.rows(), matrix.cols()).unwrap();
    assert_eq!(rebuilt.as_slice(), matrix.as_slice());
}
