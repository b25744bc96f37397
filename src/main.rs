use std::{env, fs};

use anyhow::{Context, bail};
use log::{info, warn};

use machine_learning::{specs::TrainerSpec, training};

const SPEC_ENV: &str = "TRAINER_SPEC";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = match env::args().nth(1) {
        Some(path) => path,
        None => match env::var(SPEC_ENV) {
            Ok(path) => path,
            Err(_) => bail!("usage: trainer <spec.json> (or set {SPEC_ENV})"),
        },
    };

    let raw = fs::read_to_string(&path).with_context(|| format!("reading spec {path}"))?;
    let spec = TrainerSpec::from_json(&raw).with_context(|| format!("parsing spec {path}"))?;
    info!("loaded run spec from {path}");

    if spec.load_path.is_some() && !spec.network.layers.is_empty() {
        warn!("load_path is set, the network section of the spec is ignored");
    }

    let report = training::run(&spec).context("training run failed")?;

    println!("network:\n{}", report.info);
    for stats in &report.epochs {
        println!(
            "epoch {:>4}  lr {:.6}  loss {:.6}  accuracy {:.4}",
            stats.epoch, stats.learning_rate, stats.loss, stats.accuracy
        );
    }
    println!("final loss {:.6}, accuracy {:.4}", report.loss, report.accuracy);

    Ok(())
}
