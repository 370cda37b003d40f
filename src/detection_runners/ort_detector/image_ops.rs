//! Frame preprocessing: letterbox into the model input and lay out as NCHW.

use anyhow::{bail, Result};
use fast_image_resize::{
    images::{CroppedImageMut, Image as FirImage},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use ndarray::Array;
use rayon::prelude::*;
use crate::common::{BvrImage, ImageTransformInfo};
use crate::detection_runners::input_wrapper::X;

/// Grey used to fill the letterbox border.
pub const LETTERBOX_FILL: u8 = 114;

/// Letterboxes every frame into `target_w x target_h` and stacks them into one
/// `[N, 3, H, W]` batch normalised to `[0, 1]`.
pub fn preprocess(xs: &[BvrImage], target_h: u32, target_w: u32) -> Result<(X, Vec<ImageTransformInfo>)> {
    if xs.is_empty() {
        bail!("Nothing to preprocess");
    }
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

    let prepared: Vec<(Vec<f32>, ImageTransformInfo)> = xs
        .par_iter()
        .map(|img| {
            let mut resizer = Resizer::new();
            let (resized, info) = letterbox_image(img, target_h, target_w, LETTERBOX_FILL, &mut resizer, &options)?;
            Ok((nchw_normalize_flat(&resized)?, info))
        })
        .collect::<Result<_>>()?;

    let channels = 3;
    let height = target_h as usize;
    let width = target_w as usize;
    let image_size = channels * height * width;

    let mut batch_flat: Vec<f32> = Vec::with_capacity(xs.len() * image_size);
    let mut infos = Vec::with_capacity(xs.len());
    for (tensor, info) in prepared {
        batch_flat.extend_from_slice(&tensor);
        infos.push(info);
    }

    let batch = Array::from_shape_vec((xs.len(), channels, height, width), batch_flat)?.into_dyn();

    Ok((X::from(batch), infos))
}

pub fn make_divisible(x: usize, divisor: usize) -> usize {
    x.div_ceil(divisor) * divisor
}

/// Aspect-preserving resize anchored at the top-left corner, padded with `bg`.
pub fn letterbox_image<'a>(
    img: &BvrImage,
    target_h: u32,
    target_w: u32,
    bg: u8,
    resizer: &mut Resizer,
    resize_options: &ResizeOptions,
) -> Result<(FirImage<'a>, ImageTransformInfo)> {
    let (w0, h0) = img.dimensions();
    if w0 == 0 || h0 == 0 {
        bail!("Cannot letterbox an empty {}x{} frame", w0, h0);
    }
    let ratio = (target_w as f32 / w0 as f32).min(target_h as f32 / h0 as f32);
    let new_w = ((w0 as f32 * ratio).round() as u32).clamp(1, target_w);
    let new_h = ((h0 as f32 * ratio).round() as u32).clamp(1, target_h);

    let mut padded = FirImage::from_vec_u8(
        target_w,
        target_h,
        vec![bg; (target_w * target_h * 3) as usize],
        PixelType::U8x3,
    )?;

    let src = img.as_fir_image()?;
    let mut cropped = CroppedImageMut::new(&mut padded, 0, 0, new_w, new_h)?;
    resizer.resize(&src, &mut cropped, resize_options)?;

    let info = ImageTransformInfo {
        width_src: w0,
        height_src: h0,
        width_dst: target_w,
        height_dst: target_h,
        ratio,
    };
    Ok((padded, info))
}

fn nchw_normalize_flat(img: &FirImage) -> Result<Vec<f32>> {
    let buf = img.buffer();
    let w = img.width() as usize;
    let h = img.height() as usize;

    if buf.len() != w * h * 3 {
        bail!("Unexpected buffer size: got {}, expected {}", buf.len(), w * h * 3);
    }

    let hw = w * h;
    let mut out = vec![0.0f32; buf.len()];
    for (i, px) in buf.chunks_exact(3).enumerate() {
        out[i] = px[0] as f32 / 255.0;
        out[i + hw] = px[1] as f32 / 255.0;
        out[i + 2 * hw] = px[2] as f32 / 255.0;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_stride() {
        assert_eq!(make_divisible(640, 32), 640);
        assert_eq!(make_divisible(650, 32), 672);
        assert_eq!(make_divisible(1, 32), 32);
    }

    #[test]
    fn wide_frame_is_padded_below() {
        let frame = BvrImage::filled(200, 100, [255, 0, 0]);
        let (x, infos) = preprocess(&[frame], 64, 64).unwrap();
        assert_eq!(x.shape(), &[1, 3, 64, 64]);

        let info = infos[0];
        assert!((info.ratio - 0.32).abs() < 1e-6);
        assert_eq!((info.width_src, info.height_src), (200, 100));

        // inside the resized area: pure red
        assert!((x[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert!(x[[0, 1, 10, 10]].abs() < 1e-6);
        // below it: letterbox grey
        let grey = LETTERBOX_FILL as f32 / 255.0;
        assert!((x[[0, 0, 50, 10]] - grey).abs() < 1e-6);
        assert!((x[[0, 2, 63, 63]] - grey).abs() < 1e-6);
    }

    #[test]
    fn batches_keep_frame_order() {
        let frames = [BvrImage::filled(32, 32, [0, 0, 0]), BvrImage::filled(32, 32, [255, 255, 255])];
        let (x, infos) = preprocess(&frames, 32, 32).unwrap();
        assert_eq!(infos.len(), 2);
        assert!(x[[0, 0, 5, 5]].abs() < 1e-6);
        assert!((x[[1, 0, 5, 5]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_frame_is_rejected() {
        let frame = BvrImage::default();
        assert!(preprocess(&[frame], 32, 32).is_err());
    }
}
