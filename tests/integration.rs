//! Integration Tests for the plasticity library

use std::fs;

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

use plasticity::{
    ActivationType, Bcm, BcmParams, Config, Error, Hopfield, HopfieldParams, ModelConfig,
    Optimizer, OptimizerKind, OptimizerParams, RuleKind, WeightInit, WeightInitializer,
};

fn gaussian(n_samples: usize, n_features: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::random_using((n_samples, n_features), Normal::new(0.0, 1.0).unwrap(), &mut rng)
}

fn bcm(outputs: usize, batch_size: usize, init: WeightInit) -> Bcm {
    let config = ModelConfig {
        outputs,
        batch_size,
        ..ModelConfig::default()
    };
    Bcm::new(
        config,
        BcmParams::default(),
        Optimizer::new(OptimizerKind::Sgd, OptimizerParams::default()).unwrap(),
        WeightInitializer::new(init, 42).unwrap(),
    )
    .unwrap()
}

fn hopfield(outputs: usize, batch_size: usize, params: HopfieldParams, init: WeightInit) -> Hopfield {
    let config = ModelConfig {
        outputs,
        batch_size,
        ..ModelConfig::default()
    };
    Hopfield::new(
        config,
        params,
        Optimizer::new(OptimizerKind::Sgd, OptimizerParams::default()).unwrap(),
        WeightInitializer::new(init, 42).unwrap(),
    )
    .unwrap()
}

/// Encoded features equal the logistic of W·Xᵀ after a single epoch
#[test]
fn test_bcm_end_to_end() {
    let x = gaussian(10, 5, 42);
    let mut model = bcm(10, 10, WeightInit::Normal { mu: 1.0, sigma: 2.5 });

    let summary = model.fit(x.view(), 1, 42).unwrap();
    assert_eq!(summary.epochs_run, 1);
    assert_eq!(summary.iterations, 1);

    let features = model.predict(x.view()).unwrap();
    assert_eq!(features.dim(), (10, 10));

    let expected = model.weights().dot(&x.t()).mapv(|v| ActivationType::Logistic.activate(v));
    for (a, b) in features.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-4);
    }
}

#[test]
fn test_shape_after_fit() {
    let x = gaussian(40, 6, 1);
    let mut b = bcm(8, 10, WeightInit::GlorotUniform);
    b.fit(x.view(), 2, 0).unwrap();
    assert_eq!(b.weights().dim(), (8, 6));

    let mut h = hopfield(8, 10, HopfieldParams::default(), WeightInit::HeNormal);
    h.fit(x.view(), 2, 0).unwrap();
    assert_eq!(h.weights().dim(), (8, 6));
    assert_eq!(h.predict(x.view()).unwrap().dim(), (8, 40));
}

#[test]
fn test_not_fitted() {
    let x = gaussian(10, 5, 0);
    let model = bcm(4, 5, WeightInit::Ones);
    let dir = tempdir().unwrap();

    let err = model.predict(x.view()).unwrap_err();
    assert!(matches!(err, Error::NotFitted));
    assert_eq!(
        err.to_string(),
        "Fitted error. The model is not fitted yet.\nPlease call the fit function before using the predict member."
    );

    let err = model.save_weights(dir.path().join("w.bin")).unwrap_err();
    assert!(matches!(err, Error::NotFitted));
}

#[test]
fn test_save_and_load_weights() {
    let x = gaussian(20, 5, 3);
    let dir = tempdir().unwrap();
    let path = dir.path().join("weights.bin");

    let mut trained = bcm(4, 10, WeightInit::Normal { mu: 0.0, sigma: 1.0 });
    trained.fit(x.view(), 3, 7).unwrap();
    trained.save_weights(&path).unwrap();

    let mut restored = bcm(4, 10, WeightInit::Zeros);
    assert!(!restored.is_fitted());
    restored.load_weights(&path).unwrap();
    assert!(restored.is_fitted());

    for (a, b) in trained.weights().iter().zip(restored.weights().iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-4);
    }
    let expected = trained.predict(x.view()).unwrap();
    let actual = restored.predict(x.view()).unwrap();
    for (a, b) in expected.iter().zip(actual.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-4);
    }
}

#[test]
fn test_load_from_deleted_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dummy");

    let x = gaussian(10, 5, 42);
    let mut model = bcm(10, 10, WeightInit::Normal { mu: 1.0, sigma: 2.5 });
    model.fit(x.view(), 1, 42).unwrap();
    model.save_weights(&path).unwrap();
    fs::remove_file(&path).unwrap();

    let err = model.load_weights(&path).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
    assert_eq!(err.to_string(), format!("File not found. Given : {}", path.display()));
}

#[test]
fn test_load_weights_resizes_features_only() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("weights.bin");

    let mut trained = bcm(4, 10, WeightInit::Normal { mu: 0.0, sigma: 1.0 });
    trained.fit(gaussian(20, 7, 0).view(), 1, 0).unwrap();
    trained.save_weights(&path).unwrap();

    // a different feature count is taken from the file
    let mut wider = bcm(4, 10, WeightInit::Zeros);
    wider.fit(gaussian(20, 3, 0).view(), 1, 0).unwrap();
    wider.load_weights(&path).unwrap();
    assert_eq!(wider.weights().dim(), (4, 7));

    // a different number of outputs is rejected and the model left untouched
    let mut smaller = bcm(3, 10, WeightInit::Zeros);
    let err = smaller.load_weights(&path).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch(_)));
    assert!(!smaller.is_fitted());
}

#[test]
fn test_predict_wrong_features() {
    let x = gaussian(20, 5, 0);
    let mut model = bcm(4, 10, WeightInit::Ones);
    model.fit(x.view(), 1, 0).unwrap();

    let err = model.predict(gaussian(3, 6, 0).view()).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch(_)));
    assert_eq!(
        err.to_string(),
        "Invalid dimensions found. The input (n_samples, n_features) shape is inconsistent with the number of weights (5)"
    );
}

#[test]
fn test_deterministic_training() {
    let x = gaussian(50, 8, 11);

    let mut first = bcm(6, 10, WeightInit::HeUniform);
    let mut second = bcm(6, 10, WeightInit::HeUniform);
    first.fit(x.view(), 4, 5).unwrap();
    second.fit(x.view(), 4, 5).unwrap();
    assert_eq!(first.weights(), second.weights());

    let mut h1 = hopfield(6, 10, HopfieldParams { p: 3.0, k: 3, ..HopfieldParams::default() }, WeightInit::LecunNormal);
    let mut h2 = h1.clone();
    h1.fit(x.view(), 4, 5).unwrap();
    h2.fit(x.view(), 4, 5).unwrap();
    assert_eq!(h1.weights(), h2.weights());

    // refitting the same model starts over from the initializer
    let before = first.weights().clone();
    first.fit(x.view(), 4, 5).unwrap();
    assert_eq!(first.weights(), &before);
}

#[test]
fn test_bcm_identity_interaction() {
    let model = bcm(7, 10, WeightInit::Zeros);
    assert_eq!(model.rule().interaction_matrix(), &Array2::<f32>::eye(7));
}

#[test]
fn test_hopfield_invalid_k() {
    let config = ModelConfig {
        outputs: 10,
        ..ModelConfig::default()
    };
    let result = Hopfield::new(
        config,
        HopfieldParams { k: 1, ..HopfieldParams::default() },
        Optimizer::sgd(1e-2).unwrap(),
        WeightInitializer::new(WeightInit::Zeros, 0).unwrap(),
    );
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[test]
fn test_hopfield_learns_from_zero_weights() {
    let x = gaussian(20, 5, 2);
    let mut model = hopfield(4, 10, HopfieldParams::default(), WeightInit::Zeros);
    model.fit(x.view(), 1, 0).unwrap();
    assert!(model.weights().iter().any(|&w| w != 0.0));
    assert!(model.weights().iter().all(|w| w.is_finite()));
}

#[test]
fn test_adaptive_optimizers_stay_finite() {
    let x = gaussian(60, 10, 9);
    for kind in OptimizerKind::ALL {
        let config = ModelConfig {
            outputs: 5,
            batch_size: 20,
            weight_decay: 1e-3,
            ..ModelConfig::default()
        };
        let mut model = Hopfield::new(
            config,
            HopfieldParams { p: 3.0, ..HopfieldParams::default() },
            Optimizer::new(kind, OptimizerParams { rho: 0.9, ..OptimizerParams::default() }).unwrap(),
            WeightInitializer::new(WeightInit::Uniform { scale: 0.1 }, 1).unwrap(),
        )
        .unwrap();
        let features = model.fit_transform(x.view(), 3, 0).unwrap();
        assert_eq!(features.dim(), (5, 60), "{}", kind);
        assert!(features.iter().all(|v| v.is_finite()), "{}", kind);
    }
}

#[test]
fn test_config_driven_training() {
    let dir = tempdir().unwrap();

    // 12 synthetic 3x3 MNIST images
    let images = dir.path().join("images.idx");
    let mut bytes = Vec::new();
    for field in [2051u32, 12, 3, 3] {
        bytes.extend_from_slice(&field.to_be_bytes());
    }
    bytes.extend((0..12 * 9).map(|i| ((i * 37) % 256) as u8));
    fs::write(&images, bytes).unwrap();

    let config_path = dir.path().join("config.toml");
    let weights_path = dir.path().join("weights.bin");
    let toml = format!(
        r#"
[model]
rule = "hopfield"
outputs = 4
batch_size = 4
k = 2

[optimizer]
type = "adam"
learning_rate = 0.01

[weights]
init = "normal"
mu = 0.0
std = 0.5
seed = 3

[training]
epochs = 2
seed = 1
output = "{}"

[data]
dataset = "mnist"
files = ["{}"]
normalize = true
binarize = true
"#,
        weights_path.display(),
        images.display()
    );
    fs::write(&config_path, toml).unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.rule().unwrap(), RuleKind::Hopfield);

    let dataset = config.load_dataset().unwrap();
    assert_eq!(dataset.n_samples(), 12);
    assert_eq!(dataset.n_features(), 9);
    assert!(dataset.samples().iter().all(|&v| v == 0.0 || v == 1.0));

    let mut model = Hopfield::new(
        config.model_config(),
        config.hopfield_params(),
        config.optimizer().unwrap(),
        config.weight_initializer().unwrap(),
    )
    .unwrap();
    let summary = model
        .fit(dataset.view(), config.training.epochs, config.training.seed)
        .unwrap();
    assert_eq!(summary.iterations, summary.epochs_run * 3);
    model.save_weights(&config.training.output).unwrap();
    assert_eq!(
        fs::metadata(&weights_path).unwrap().len(),
        16 + 4 * 9 * 4
    );
}
