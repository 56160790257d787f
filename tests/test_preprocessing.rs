//! Integration test: encoding and scaling pipeline

use cardspend::preprocessing::{FeatureSchema, FeatureScaler, OneHotEncoder, TargetScaler};
use cardspend::record::CATEGORICAL_FIELDS;
use ndarray::array;
use polars::prelude::*;

fn raw_df() -> DataFrame {
    df!(
        "reports" => &[0i64, 1, 2, 0],
        "age" => &[35.0, 45.0, 25.0, 52.0],
        "income" => &[4.5, 3.2, 2.8, 5.1],
        "share" => &[0.05, 0.03, 0.04, 0.07],
        "owner" => &["yes", "no", "yes", "no"],
        "selfemp" => &["no", "yes", "no", "no"],
        "dependents" => &[2i64, 1, 3, 0],
        "months" => &[36i64, 24, 48, 60],
        "majorcards" => &[1i64, 1, 0, 1],
        "active" => &[12i64, 8, 15, 3]
    )
    .unwrap()
}

#[test]
fn test_encoded_layout_is_stable_across_fits() {
    let mut encoder_a = OneHotEncoder::new(&CATEGORICAL_FIELDS);
    let mut encoder_b = OneHotEncoder::new(&CATEGORICAL_FIELDS);

    let names_a: Vec<String> = encoder_a
        .fit_transform(&raw_df())
        .unwrap()
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let names_b: Vec<String> = encoder_b
        .fit_transform(&raw_df())
        .unwrap()
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    assert_eq!(names_a, names_b);
    assert!(names_a.contains(&"owner_yes".to_string()));
    assert!(names_a.contains(&"owner_no".to_string()));
    assert!(names_a.contains(&"selfemp_yes".to_string()));
    assert!(names_a.contains(&"selfemp_no".to_string()));
}

#[test]
fn test_reindex_recovers_training_layout_from_scrambled_input() {
    let mut encoder = OneHotEncoder::new(&CATEGORICAL_FIELDS);
    let encoded = encoder.fit_transform(&raw_df()).unwrap();
    let schema = FeatureSchema::new(
        encoded
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );

    // Input with columns out of order, one schema column missing
    // (selfemp one-hot only produced "no"), and one extra column
    let scrambled = df!(
        "extra" => &[1.0],
        "age" => &[30.0],
        "income" => &[4.0],
        "share" => &[0.1],
        "reports" => &[0i64],
        "dependents" => &[1i64],
        "months" => &[12i64],
        "majorcards" => &[1i64],
        "active" => &[2i64],
        "owner" => &["yes"],
        "selfemp" => &["no"]
    )
    .unwrap();

    let mut inference_encoder = OneHotEncoder::new(&CATEGORICAL_FIELDS);
    let inference_encoded = inference_encoder.fit_transform(&scrambled).unwrap();
    // This input never saw selfemp=yes, so that indicator is absent
    assert!(inference_encoded.column("selfemp_yes").is_err());

    let aligned = schema.reindex(&inference_encoded).unwrap();
    let aligned_names: Vec<String> = aligned
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(aligned_names, schema.columns());

    // The absent indicator came back zero-filled, the extra column is gone
    let selfemp_yes = aligned.column("selfemp_yes").unwrap().f64().unwrap();
    assert_eq!(selfemp_yes.get(0), Some(0.0));
    assert!(aligned.column("extra").is_err());
}

#[test]
fn test_feature_scaler_statistics_are_frozen() {
    let train = df!("income" => &[1.0, 2.0, 3.0]).unwrap();
    let inference = df!("income" => &[100.0, 200.0]).unwrap();

    let mut scaler = FeatureScaler::new();
    scaler.fit(&train, &["income".to_string()]).unwrap();

    // Transform of unseen data must use training statistics (mean 2,
    // std 1), not refit
    let result = scaler.transform(&inference).unwrap();
    let col = result.column("income").unwrap().f64().unwrap();
    assert_eq!(col.get(0), Some(98.0));
    assert_eq!(col.get(1), Some(198.0));
}

#[test]
fn test_target_scaler_inverse_is_exact_within_range() {
    let y = array![12.0, 3_000.0, 450.5, 0.0, 1_817.25];
    let mut scaler = TargetScaler::new();
    scaler.fit(&y);

    let scaled = scaler.transform(&y).unwrap();
    assert!(scaled.iter().all(|v| (0.0..=1.0).contains(v)));

    let restored = scaler.inverse_transform(&scaled).unwrap();
    for (orig, back) in y.iter().zip(restored.iter()) {
        assert!((orig - back).abs() < 1e-9, "{orig} != {back}");
    }
}

#[test]
fn test_matrix_extraction_matches_schema_order_regardless_of_input_order() {
    let schema = FeatureSchema::new(vec![
        "age".to_string(),
        "income".to_string(),
        "share".to_string(),
    ]);

    let forward = df!(
        "age" => &[30.0],
        "income" => &[4.0],
        "share" => &[0.1]
    )
    .unwrap();
    let reversed = df!(
        "share" => &[0.1],
        "income" => &[4.0],
        "age" => &[30.0]
    )
    .unwrap();

    let a = schema.to_matrix(&forward).unwrap();
    let b = schema.to_matrix(&reversed).unwrap();
    assert_eq!(a, b);
}
