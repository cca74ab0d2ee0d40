use std::path::PathBuf;

use anyhow::bail;
use clap::{ArgAction, ArgGroup, Parser};
use qrun_libcli::delegate::NPU_DELEGATE;
use qrun_libcli::model::ModelFormat;
use qrun_libcli::vision::Normalization;
use tract_core::prelude::*;

/// How many predictions to print when labels are given without `--top-k`.
pub const DEFAULT_TOP_K: usize = 5;

/// Run a quantized image classifier.
#[derive(Parser, Debug)]
#[command(name = "qrun", version)]
#[command(group(ArgGroup::new("source").required(true).args(["image", "features"])))]
pub struct Args {
    /// Run on the hardware accelerated (npu) delegate
    #[arg(long = "use-npu")]
    pub use_npu: bool,

    /// Execution delegate: default, unoptimized or npu
    #[arg(long, default_value = "default")]
    pub delegate: String,

    /// Model file (.tflite, .lite or .onnx)
    #[arg(long)]
    pub model: PathBuf,

    /// Image to classify
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Comma separated raw input values, fed instead of an image
    #[arg(long)]
    pub features: Option<PathBuf>,

    /// Model format, guessed from the extension if absent
    #[arg(long)]
    pub format: Option<ModelFormat>,

    /// Pixel normalization: unit, symmetric or imagenet
    #[arg(long, default_value = "unit")]
    pub normalize: Normalization,

    /// Class labels, one per line
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Number of best scores to print
    #[arg(long = "top-k")]
    pub top_k: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Sets the level of verbosity
    #[arg(short, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
    Image(PathBuf),
    Features(PathBuf),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameters {
    pub model: PathBuf,
    pub format: Option<ModelFormat>,
    pub delegate: String,
    pub input: InputSource,
    pub normalization: Normalization,
    pub labels: Option<PathBuf>,
    pub top_k: Option<usize>,
    pub json: bool,
}

impl Parameters {
    pub fn from_args(args: Args) -> TractResult<Parameters> {
        let input = match (args.image, args.features) {
            (Some(image), None) => InputSource::Image(image),
            (None, Some(features)) => InputSource::Features(features),
            _ => bail!("Exactly one of --image and --features is required"),
        };
        let delegate = if args.use_npu { NPU_DELEGATE.to_string() } else { args.delegate };
        let top_k = args.top_k.or(args.labels.as_ref().map(|_| DEFAULT_TOP_K));
        Ok(Parameters {
            model: args.model,
            format: args.format,
            delegate,
            input,
            normalization: args.normalize,
            labels: args.labels,
            top_k,
            json: args.json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(argv: &[&str]) -> Parameters {
        Parameters::from_args(Args::try_parse_from(argv.iter().copied()).unwrap()).unwrap()
    }

    #[test]
    fn image_run() {
        let p = params(&["qrun", "--model", "m.tflite", "--image", "beer.jpg"]);
        assert_eq!(p.input, InputSource::Image("beer.jpg".into()));
        assert_eq!(p.delegate, "default");
        assert_eq!(p.format, None);
        assert_eq!(p.normalization, Normalization::Unit);
        assert_eq!(p.top_k, None);
    }

    #[test]
    fn use_npu_selects_npu_delegate() {
        let p = params(&["qrun", "--use-npu", "--model", "m.tflite", "--image", "a.png"]);
        assert_eq!(p.delegate, NPU_DELEGATE);
    }

    #[test]
    fn labels_imply_top_k() {
        let p = params(&["qrun", "--model", "m.onnx", "--features", "f.csv", "--labels", "l.txt"]);
        assert_eq!(p.top_k, Some(DEFAULT_TOP_K));
        let p = params(&[
            "qrun", "--model", "m.onnx", "--features", "f.csv", "--labels", "l.txt", "--top-k", "2",
        ]);
        assert_eq!(p.top_k, Some(2));
    }

    #[test]
    fn overrides() {
        let p = params(&[
            "qrun",
            "--model",
            "model.bin",
            "--format",
            "onnx",
            "--normalize",
            "imagenet",
            "--image",
            "a.png",
        ]);
        assert_eq!(p.format, Some(ModelFormat::Onnx));
        assert_eq!(p.normalization, Normalization::Imagenet);
    }

    #[test]
    fn exactly_one_source() {
        assert!(Args::try_parse_from(["qrun", "--model", "m.tflite"]).is_err());
        assert!(
            Args::try_parse_from([
                "qrun", "--model", "m.tflite", "--image", "a.png", "--features", "f.csv"
            ])
            .is_err()
        );
        assert!(Args::try_parse_from(["qrun", "--model", "m", "--image", "a", "--format", "pb"])
            .is_err());
    }
}
