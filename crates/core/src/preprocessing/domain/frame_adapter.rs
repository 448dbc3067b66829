//! Converts host camera buffers into upright RGB8 images.
//!
//! Handles packed RGB/BGR(A), 8-bit gray and the two bi-planar YUV 4:2:0
//! layouts cameras deliver (NV12 on iOS, NV21 on Android), honouring row
//! padding. Rotation to upright is done with `image::imageops`.

use image::{imageops, RgbImage};

use super::normalized_image::NormalizedImage;
use super::transform_matrix::TransformMatrix;
use crate::shared::error::DetectionError;
use crate::shared::frame::{Orientation, PixelFormat, RawFrame};

/// Adapt a host frame into the pipeline's fixed image representation.
pub fn adapt(frame: &RawFrame<'_>) -> Result<NormalizedImage, DetectionError> {
    let format = frame.format();
    let bpp = format.bytes_per_pixel().ok_or_else(|| {
        DetectionError::UnsupportedFormat(format!("cannot convert pixel format {format:?}"))
    })?;

    let w = frame.width();
    let h = frame.height();
    let to_source =
        TransformMatrix::upright_to_raw(frame.orientation(), w as f64, h as f64);
    if w == 0 || h == 0 {
        // Degenerate geometry is the preprocessing stage's call to reject.
        return Ok(NormalizedImage::new(RgbImage::new(0, 0), to_source));
    }

    let row_bytes = w as usize * bpp;
    let stride = frame.bytes_per_row();
    if stride < row_bytes {
        return Err(DetectionError::UnsupportedFormat(format!(
            "row stride {stride} is smaller than a {row_bytes}-byte row"
        )));
    }

    let rgb = if format.is_biplanar() {
        convert_biplanar(frame, stride)?
    } else {
        convert_packed(frame, bpp, stride)?
    };

    let image = RgbImage::from_raw(w, h, rgb).ok_or_else(|| {
        DetectionError::UnsupportedFormat("converted buffer does not match frame size".into())
    })?;

    let upright = match frame.orientation() {
        Orientation::Up => image,
        Orientation::Right => imageops::rotate90(&image),
        Orientation::Down => imageops::rotate180(&image),
        Orientation::Left => imageops::rotate270(&image),
    };

    Ok(NormalizedImage::new(upright, to_source))
}

/// Bytes spanned by `rows` full strides plus a trailing partial row.
fn span(stride: usize, rows: usize, tail: usize) -> Result<usize, DetectionError> {
    stride
        .checked_mul(rows)
        .and_then(|n| n.checked_add(tail))
        .ok_or_else(|| {
            DetectionError::UnsupportedFormat(format!(
                "row stride {stride} overflows the addressable buffer size"
            ))
        })
}

fn check_len(frame: &RawFrame<'_>, required: usize) -> Result<(), DetectionError> {
    if frame.data().len() < required {
        return Err(DetectionError::UnsupportedFormat(format!(
            "buffer holds {} bytes, frame needs {required}",
            frame.data().len()
        )));
    }
    Ok(())
}

fn convert_packed(
    frame: &RawFrame<'_>,
    bpp: usize,
    stride: usize,
) -> Result<Vec<u8>, DetectionError> {
    let w = frame.width() as usize;
    let h = frame.height() as usize;
    check_len(frame, span(stride, h - 1, w * bpp)?)?;

    // Byte offsets of R, G, B within one pixel.
    let (r, g, b) = match frame.format() {
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => (0, 1, 2),
        PixelFormat::Bgr8 | PixelFormat::Bgra8 => (2, 1, 0),
        _ => (0, 0, 0),
    };

    let data = frame.data();
    let mut out = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        let row = &data[y * stride..y * stride + w * bpp];
        for px in row.chunks_exact(bpp) {
            out.extend_from_slice(&[px[r], px[g], px[b]]);
        }
    }
    Ok(out)
}

fn convert_biplanar(frame: &RawFrame<'_>, stride: usize) -> Result<Vec<u8>, DetectionError> {
    let w = frame.width() as usize;
    let h = frame.height() as usize;
    if w % 2 != 0 || h % 2 != 0 {
        return Err(DetectionError::UnsupportedFormat(format!(
            "4:2:0 frame must have even dimensions, got {w}x{h}"
        )));
    }

    // Luma rows, then half as many chroma rows sharing the same stride.
    check_len(frame, span(stride, h + h / 2 - 1, w)?)?;
    let chroma_start = stride * h;

    // Chroma byte order within each U/V pair.
    let (u_off, v_off) = match frame.format() {
        PixelFormat::Nv21 => (1, 0),
        _ => (0, 1),
    };

    let data = frame.data();
    let mut out = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        let luma = &data[y * stride..y * stride + w];
        let chroma_row = chroma_start + (y / 2) * stride;
        for (x, &luma_px) in luma.iter().enumerate() {
            let pair = chroma_row + (x / 2) * 2;
            let u = data[pair + u_off];
            let v = data[pair + v_off];
            out.extend_from_slice(&yuv_to_rgb(luma_px, u, v));
        }
    }
    Ok(out)
}

/// BT.601 full-range conversion.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    let r = y + 1.402 * v;
    let g = y - 0.344_136 * u - 0.714_136 * v;
    let b = y + 1.772 * u;
    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rgb_at(img: &NormalizedImage, x: u32, y: u32) -> [u8; 3] {
        img.image().get_pixel(x, y).0
    }

    #[test]
    fn test_rgb_passthrough() {
        let data: Vec<u8> = (0..2 * 2 * 3).map(|v| v as u8).collect();
        let frame = RawFrame::new(&data, 2, 2, PixelFormat::Rgb8);
        let img = adapt(&frame).unwrap();
        assert_eq!(img.image().as_raw(), &data);
    }

    #[test]
    fn test_bgra_swaps_channels_and_drops_alpha() {
        let data = vec![10, 20, 30, 255];
        let frame = RawFrame::new(&data, 1, 1, PixelFormat::Bgra8);
        let img = adapt(&frame).unwrap();
        assert_eq!(rgb_at(&img, 0, 0), [30, 20, 10]);
    }

    #[test]
    fn test_gray_replicates_channel() {
        let data = vec![77];
        let frame = RawFrame::new(&data, 1, 1, PixelFormat::Gray8);
        let img = adapt(&frame).unwrap();
        assert_eq!(rgb_at(&img, 0, 0), [77, 77, 77]);
    }

    #[test]
    fn test_padded_rows_are_skipped() {
        // 1x2 RGB with 2 bytes of padding per row.
        let data = vec![1, 2, 3, 0, 0, 4, 5, 6, 0, 0];
        let frame = RawFrame::new(&data, 1, 2, PixelFormat::Rgb8).with_stride(5);
        let img = adapt(&frame).unwrap();
        assert_eq!(img.image().as_raw(), &vec![1, 2, 3, 4, 5, 6]);
    }

    #[rstest]
    #[case(PixelFormat::Nv12)]
    #[case(PixelFormat::Nv21)]
    fn test_neutral_chroma_yields_gray(#[case] format: PixelFormat) {
        // 2x2 luma plane + one U/V pair.
        let data = vec![100, 100, 100, 100, 128, 128];
        let frame = RawFrame::new(&data, 2, 2, format);
        let img = adapt(&frame).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(rgb_at(&img, x, y), [100, 100, 100]);
            }
        }
    }

    #[test]
    fn test_nv21_and_nv12_read_chroma_in_opposite_order() {
        let data = vec![128, 128, 128, 128, 200, 60];
        let nv12 = adapt(&RawFrame::new(&data, 2, 2, PixelFormat::Nv12)).unwrap();
        let nv21 = adapt(&RawFrame::new(&data, 2, 2, PixelFormat::Nv21)).unwrap();
        // NV12: U=200 (strong blue), NV21: V=200 (strong red).
        let a = rgb_at(&nv12, 0, 0);
        let b = rgb_at(&nv21, 0, 0);
        assert!(a[2] > a[0]);
        assert!(b[0] > b[2]);
    }

    #[test]
    fn test_odd_yuv_dimensions_rejected() {
        let data = vec![0u8; 64];
        let frame = RawFrame::new(&data, 3, 2, PixelFormat::Nv21);
        assert_eq!(adapt(&frame).unwrap_err().code(), "UnsupportedFormat");
    }

    #[test]
    fn test_unknown_format_rejected() {
        let data = vec![0u8; 16];
        let frame = RawFrame::new(&data, 2, 2, PixelFormat::Other("yuv422".into()));
        assert_eq!(adapt(&frame).unwrap_err().code(), "UnsupportedFormat");
    }

    #[test]
    fn test_short_buffer_rejected() {
        let data = vec![0u8; 5];
        let frame = RawFrame::new(&data, 2, 2, PixelFormat::Rgb8);
        assert_eq!(adapt(&frame).unwrap_err().code(), "UnsupportedFormat");
    }

    #[test]
    fn test_stride_smaller_than_row_rejected() {
        let data = vec![0u8; 12];
        let frame = RawFrame::new(&data, 2, 2, PixelFormat::Rgb8).with_stride(4);
        assert_eq!(adapt(&frame).unwrap_err().code(), "UnsupportedFormat");
    }

    #[test]
    fn test_zero_area_passes_through() {
        let data: Vec<u8> = Vec::new();
        let frame = RawFrame::new(&data, 0, 480, PixelFormat::Rgb8);
        let img = adapt(&frame).unwrap();
        assert_eq!(img.width(), 0);
    }

    #[rstest]
    #[case(Orientation::Up, 4, 2)]
    #[case(Orientation::Right, 2, 4)]
    #[case(Orientation::Down, 4, 2)]
    #[case(Orientation::Left, 2, 4)]
    fn test_rotation_dimensions(
        #[case] orientation: Orientation,
        #[case] width: u32,
        #[case] height: u32,
    ) {
        let data = vec![0u8; 4 * 2 * 3];
        let frame = RawFrame::new(&data, 4, 2, PixelFormat::Rgb8).with_orientation(orientation);
        let img = adapt(&frame).unwrap();
        assert_eq!((img.width(), img.height()), (width, height));
    }

    #[rstest]
    #[case(PixelFormat::Rgb8, 3)]
    #[case(PixelFormat::Bgra8, 2)]
    #[case(PixelFormat::Nv12, 2)]
    #[case(PixelFormat::Nv21, 4)]
    fn test_absurd_stride_is_unsupported_not_a_panic(
        #[case] format: PixelFormat,
        #[case] height: u32,
    ) {
        let data = vec![0u8; 64];
        let frame = RawFrame::new(&data, 2, height, format).with_stride(usize::MAX);
        assert_eq!(adapt(&frame).unwrap_err().code(), "UnsupportedFormat");
    }

    #[test]
    fn test_rotation_pixel_lands_where_transform_says() {
        // Mark raw pixel (3, 0) in a 4x2 frame; rotate 90° clockwise.
        let mut data = vec![0u8; 4 * 2 * 3];
        data[3 * 3] = 255;
        let frame =
            RawFrame::new(&data, 4, 2, PixelFormat::Rgb8).with_orientation(Orientation::Right);
        let img = adapt(&frame).unwrap();

        // Find the marked pixel in the upright image and map its centre back.
        let (ux, uy) = img
            .image()
            .enumerate_pixels()
            .find(|(_, _, p)| p.0[0] == 255)
            .map(|(x, y, _)| (x, y))
            .unwrap();
        let raw = img
            .to_source()
            .apply(crate::shared::geometry::Point::new(ux as f64 + 0.5, uy as f64 + 0.5));
        assert_eq!((raw.x.floor() as u32, raw.y.floor() as u32), (3, 0));
    }
}
