use log::info;

use super::NetworkBuilder;
use crate::{MlErr, Result, arch::EpochStats, specs::TrainerSpec};

/// The outcome of a training run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The topology of the trained network.
    pub info: String,
    pub epochs: Vec<EpochStats>,
    /// The loss over the test split once training finished.
    pub loss: f32,
    /// The accuracy over the test split once training finished.
    pub accuracy: f32,
}

/// Runs the training described by `spec`: materializes and splits the dataset, builds or
/// loads the network, trains it and optionally saves it.
pub fn run(spec: &TrainerSpec) -> Result<RunReport> {
    let builder = NetworkBuilder::new();

    let mut dataset = builder.resolve_dataset(&spec.dataset)?;
    if spec.shuffle {
        let mut rng = builder.generate_rng(spec.network.seed);
        dataset.shuffle(&mut rng);
    }
    let (train, test) = dataset.split(spec.train_fraction)?;

    let mut network = builder.build(spec)?;
    if network.input_size() != dataset.x_size() {
        return Err(MlErr::ShapeMismatch {
            what: "dataset features",
            got: dataset.x_size(),
            expected: network.input_size(),
        });
    }

    let info = network.info();
    let loss = builder.resolve_loss(spec.loss);
    let epochs = network.train(&train, &test, spec.epochs, loss, spec.batch_size)?;

    if let Some(path) = &spec.save_path {
        network.save_to_path(path)?;
        info!("model saved to {}", path.display());
    }

    Ok(RunReport {
        info,
        epochs,
        loss: network.calculate_loss(&test)?,
        accuracy: network.accuracy(&test)?,
    })
}
