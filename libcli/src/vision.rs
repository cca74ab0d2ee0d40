use std::path::Path;
use std::str::FromStr;

use anyhow::bail;
use image::imageops::FilterType;
use image::DynamicImage;
use qrun_quant::{ensure_file_exists, QrunError};
use tract_core::internal::*;
use tract_ndarray::Array4;

use crate::model::{ImageGeometry, Layout};

const GRAYSCALE_WEIGHTS: [f32; 3] = [0.2989, 0.5870, 0.1140];
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// How 8-bit pixel values become real values before quantization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Normalization {
    /// `[0, 1]`
    #[default]
    Unit,
    /// `[-1, 1]`
    Symmetric,
    /// `[0, 1]`, then per channel ImageNet mean and standard deviation.
    Imagenet,
}

impl Normalization {
    fn apply(&self, pixel: f32, channel: usize, channels: usize) -> f32 {
        match self {
            Normalization::Unit => pixel / 255.0,
            Normalization::Symmetric => pixel / 127.5 - 1.0,
            Normalization::Imagenet => {
                let (mean, std) = if channels == 1 {
                    let mean = IMAGENET_MEAN.iter().sum::<f32>() / 3.0;
                    (mean, IMAGENET_STD.iter().sum::<f32>() / 3.0)
                } else {
                    (IMAGENET_MEAN[channel], IMAGENET_STD[channel])
                };
                (pixel / 255.0 - mean) / std
            }
        }
    }
}

impl FromStr for Normalization {
    type Err = TractError;
    fn from_str(s: &str) -> TractResult<Normalization> {
        match s {
            "unit" => Ok(Normalization::Unit),
            "symmetric" => Ok(Normalization::Symmetric),
            "imagenet" => Ok(Normalization::Imagenet),
            _ => bail!("Unknown normalization {s}, expected unit, symmetric or imagenet"),
        }
    }
}

pub fn load_image(path: impl AsRef<Path>) -> TractResult<DynamicImage> {
    let path = path.as_ref();
    ensure_file_exists(path)?;
    image::open(path)
        .map_err(|e| QrunError::ParseError(format!("decoding {}: {e}", path.display())).into())
}

fn grayscale(rgb: [u8; 3]) -> f32 {
    rgb.iter().zip(GRAYSCALE_WEIGHTS).map(|(&v, w)| v as f32 * w).sum()
}

/// Resize, convert and normalize an image into a batch of one.
///
/// The result is a float tensor laid out as the model input expects it.
pub fn preprocess(
    image: &DynamicImage,
    geometry: &ImageGeometry,
    normalization: Normalization,
) -> TractResult<Tensor> {
    let ImageGeometry { layout, height, width, channels } = *geometry;
    let resized = image.resize_exact(width as u32, height as u32, FilterType::CatmullRom);
    let rgb = resized.to_rgb8();
    let hwc: Vec<f32> = match channels {
        3 => rgb.as_raw().iter().map(|&v| v as f32).collect(),
        1 => rgb.pixels().map(|p| grayscale(p.0)).collect(),
        c => {
            return Err(QrunError::UnsupportedFormat(format!("images with {c} channels")).into());
        }
    };
    let at = |y: usize, x: usize, c: usize| {
        normalization.apply(hwc[(y * width + x) * channels + c], c, channels)
    };
    let tensor: Tensor = match layout {
        Layout::Nhwc => {
            Array4::from_shape_fn((1, height, width, channels), |(_, y, x, c)| at(y, x, c)).into()
        }
        Layout::Nchw => {
            Array4::from_shape_fn((1, channels, height, width), |(_, c, y, x)| at(y, x, c)).into()
        }
    };
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{Rgb, RgbImage};
    use qrun_quant::kind_of;

    fn checker() -> DynamicImage {
        // left column red, right column white
        DynamicImage::ImageRgb8(RgbImage::from_fn(2, 2, |x, _| {
            if x == 0 { Rgb([255, 0, 0]) } else { Rgb([255, 255, 255]) }
        }))
    }

    #[test]
    fn nhwc_unit() -> TractResult<()> {
        let geometry = ImageGeometry { layout: Layout::Nhwc, height: 2, width: 2, channels: 3 };
        let tensor = preprocess(&checker(), &geometry, Normalization::Unit)?;
        assert_eq!(tensor.shape(), &[1, 2, 2, 3]);
        let view = tensor.to_array_view::<f32>()?;
        assert_eq!(view[[0, 0, 0, 0]], 1.0);
        assert_eq!(view[[0, 0, 0, 1]], 0.0);
        assert_eq!(view[[0, 1, 1, 2]], 1.0);
        Ok(())
    }

    #[test]
    fn nchw_symmetric() -> TractResult<()> {
        let geometry = ImageGeometry { layout: Layout::Nchw, height: 2, width: 2, channels: 3 };
        let tensor = preprocess(&checker(), &geometry, Normalization::Symmetric)?;
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
        let view = tensor.to_array_view::<f32>()?;
        assert_eq!(view[[0, 0, 0, 0]], 1.0);
        assert_eq!(view[[0, 1, 0, 0]], -1.0);
        assert_eq!(view[[0, 1, 0, 1]], 1.0);
        Ok(())
    }

    #[test]
    fn grayscale_weights() -> TractResult<()> {
        let geometry = ImageGeometry { layout: Layout::Nhwc, height: 2, width: 2, channels: 1 };
        let tensor = preprocess(&checker(), &geometry, Normalization::Unit)?;
        assert_eq!(tensor.shape(), &[1, 2, 2, 1]);
        let view = tensor.to_array_view::<f32>()?;
        assert_abs_diff_eq!(view[[0, 0, 0, 0]], 0.2989, epsilon = 1e-4);
        assert_abs_diff_eq!(view[[0, 0, 1, 0]], 0.9999, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn imagenet_mean_std() {
        let v = Normalization::Imagenet.apply(255.0, 0, 3);
        assert_abs_diff_eq!(v, (1.0 - 0.485) / 0.229, epsilon = 1e-5);
    }

    #[test]
    fn resizes_to_model_geometry() -> TractResult<()> {
        let geometry = ImageGeometry { layout: Layout::Nhwc, height: 5, width: 7, channels: 3 };
        let tensor = preprocess(&checker(), &geometry, Normalization::Unit)?;
        assert_eq!(tensor.shape(), &[1, 5, 7, 3]);
        assert!(tensor.as_slice::<f32>()?.iter().all(|v| (0.0..=1.0).contains(v)));
        Ok(())
    }

    #[test]
    fn bicubic_resampling() -> TractResult<()> {
        let geometry = ImageGeometry { layout: Layout::Nhwc, height: 5, width: 7, channels: 3 };
        let tensor = preprocess(&checker(), &geometry, Normalization::Unit)?;
        let bicubic = checker().resize_exact(7, 5, FilterType::CatmullRom).to_rgb8();
        for (got, want) in tensor.as_slice::<f32>()?.iter().zip(bicubic.as_raw()) {
            assert_abs_diff_eq!(*got, *want as f32 / 255.0, epsilon = 1e-6);
        }
        let bilinear = checker().resize_exact(7, 5, FilterType::Triangle).to_rgb8();
        assert_ne!(bilinear.as_raw(), bicubic.as_raw());
        Ok(())
    }

    #[test]
    fn four_channels_unsupported() {
        let geometry = ImageGeometry { layout: Layout::Nhwc, height: 2, width: 2, channels: 4 };
        let err = preprocess(&checker(), &geometry, Normalization::Unit).unwrap_err();
        assert!(matches!(kind_of(&err), Some(QrunError::UnsupportedFormat(_))));
    }

    #[test]
    fn unreadable_image() -> TractResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("beer.jpg");
        fs_err::write(&path, b"nope")?;
        let err = load_image(&path).unwrap_err();
        assert!(matches!(kind_of(&err), Some(QrunError::ParseError(_))));
        let err = load_image(dir.path().join("missing.jpg")).unwrap_err();
        assert!(matches!(kind_of(&err), Some(QrunError::FileNotFound(_))));
        Ok(())
    }
}
