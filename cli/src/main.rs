#[macro_use]
extern crate log;

use std::process;

use clap::Parser;
use qrun_libcli::classify::Classifier;
use qrun_libcli::delegate::delegate_for_name;
use qrun_libcli::features::{features_to_tensor, load_features};
use qrun_libcli::labels::load_labels;
use qrun_libcli::model::load_model;
use qrun_libcli::vision::{load_image, preprocess};
use tract_core::prelude::*;

mod params;

use params::{Args, InputSource, Parameters};

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env = env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, level);
    env_logger::Builder::from_env(env).format_timestamp_nanos().init();

    if let Err(e) = Parameters::from_args(args).and_then(handle) {
        error!("{e:?}");
        process::exit(1)
    }
}

fn handle(params: Parameters) -> TractResult<()> {
    let delegate = delegate_for_name(&params.delegate)?;
    let loaded = load_model(&params.model, params.format)?;
    let classifier = Classifier::new(loaded, delegate.as_ref())?;
    info!("{classifier:?}");

    let input = match &params.input {
        InputSource::Image(path) => {
            let image = load_image(path)?;
            let geometry = classifier.input.image_geometry()?;
            info!("Resizing {} to {geometry:?}", path.display());
            preprocess(&image, &geometry, params.normalization)?
        }
        InputSource::Features(path) => {
            features_to_tensor(&load_features(path)?, &classifier.input.shape)?
        }
    };
    debug!("input {input:?}");

    let labels = params.labels.as_ref().map(load_labels).transpose()?;
    let mut report = classifier.classify(&input)?;
    if let Some(k) = params.top_k {
        report = report.with_top_k(k, labels.as_deref());
    }

    if params.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
