use anyhow::{anyhow, Result};

use crate::frame::PixelFormat;

/// Convert device pixel bytes into packed RGB24.
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let expected = format.frame_len(width, height)?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "{:?} frame length mismatch: expected {}, got {}",
            format,
            expected,
            pixels.len()
        ));
    }
    match format {
        PixelFormat::Rgb24 => Ok(pixels.to_vec()),
        PixelFormat::Yuyv => Ok(yuyv_to_rgb(pixels)),
        PixelFormat::Nv12 => Ok(nv12_to_rgb(pixels, width, height)),
    }
}

/// Copy a device buffer with `stride` bytes per row into a tightly packed
/// frame. NV12 chroma rows use the same stride as luma rows. A zero stride
/// means the driver did not report one and rows are already packed.
pub(crate) fn pack_rows(
    buf: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(anyhow!("frame dimensions must be non-zero"));
    }
    let packed_len = format.frame_len(width, height)?;
    let (w, h) = (width as usize, height as usize);
    let (row_len, rows) = match format {
        PixelFormat::Rgb24 => (w * 3, h),
        PixelFormat::Yuyv => (w * 2, h),
        PixelFormat::Nv12 => (w, h + h / 2),
    };
    let stride = if stride == 0 { row_len } else { stride as usize };
    if stride < row_len {
        return Err(anyhow!(
            "{:?} stride {} is shorter than a {} byte row",
            format,
            stride,
            row_len
        ));
    }
    let needed = stride
        .checked_mul(rows - 1)
        .and_then(|len| len.checked_add(row_len))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    if buf.len() < needed {
        return Err(anyhow!(
            "{:?} buffer too short: need {} bytes, got {}",
            format,
            needed,
            buf.len()
        ));
    }
    if stride == row_len {
        return Ok(buf[..packed_len].to_vec());
    }

    let mut packed = Vec::with_capacity(packed_len);
    for row in buf.chunks(stride).take(rows) {
        packed.extend_from_slice(&row[..row_len]);
    }
    Ok(packed)
}

fn yuyv_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 2 * 3);
    for chunk in pixels.chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for &y in [chunk[0], chunk[2]].iter() {
            rgb.extend_from_slice(&yuv_to_rgb(y as f32, u, v));
        }
    }
    rgb
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w * h;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let offset = (j * w + i) * 3;
            rgb[offset..offset + 3].copy_from_slice(&yuv_to_rgb(y, u, v));
        }
    }
    rgb
}

// BT.601 full range.
fn yuv_to_rgb(y: f32, u: f32, v: f32) -> [u8; 3] {
    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;
    [clamp_to_u8(r), clamp_to_u8(g), clamp_to_u8(b)]
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_conversion_produces_gray() -> Result<()> {
        let y_plane = vec![128u8; 4];
        let uv_plane = vec![128u8; 2];
        let nv12 = [y_plane, uv_plane].concat();

        let rgb = normalize_to_rgb(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(rgb, vec![128u8; 12]);

        Ok(())
    }

    #[test]
    fn nv12_with_odd_dimensions_is_rejected() {
        // 3x2 luma plus a truncated chroma row; must error, not index past the end.
        let err = normalize_to_rgb(&[0u8; 9], 3, 2, PixelFormat::Nv12).unwrap_err();
        assert!(err.to_string().contains("must be even"));
        assert!(normalize_to_rgb(&[0u8; 12], 2, 3, PixelFormat::Nv12).is_err());
    }

    #[test]
    fn yuyv_conversion_expands_two_pixels_per_macropixel() -> Result<()> {
        // Two macropixels: neutral chroma, luma 16/235 and 90/200.
        let yuyv = vec![16, 128, 235, 128, 90, 128, 200, 128];
        let rgb = normalize_to_rgb(&yuyv, 4, 1, PixelFormat::Yuyv)?;
        assert_eq!(
            rgb,
            vec![16, 16, 16, 235, 235, 235, 90, 90, 90, 200, 200, 200]
        );
        Ok(())
    }

    #[test]
    fn yuyv_red_chroma_raises_red_channel() -> Result<()> {
        let yuyv = vec![100, 128, 100, 200];
        let rgb = normalize_to_rgb(&yuyv, 2, 1, PixelFormat::Yuyv)?;
        assert!(rgb[0] > rgb[1]);
        assert!(rgb[0] > rgb[2]);
        Ok(())
    }

    #[test]
    fn padded_rows_are_packed() -> Result<()> {
        // 2x2 YUYV, 4 data bytes per row plus 2 bytes of padding.
        let buf = vec![1, 2, 3, 4, 0xee, 0xee, 5, 6, 7, 8, 0xee, 0xee];
        let packed = pack_rows(&buf, 2, 2, 6, PixelFormat::Yuyv)?;
        assert_eq!(packed, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        Ok(())
    }

    #[test]
    fn padded_nv12_keeps_chroma_aligned() -> Result<()> {
        // 2x2 NV12 with stride 3: two luma rows, one chroma row.
        let buf = vec![10, 11, 0, 12, 13, 0, 128, 128];
        let packed = pack_rows(&buf, 2, 2, 3, PixelFormat::Nv12)?;
        assert_eq!(packed, vec![10, 11, 12, 13, 128, 128]);
        Ok(())
    }

    #[test]
    fn packed_buffer_with_trailing_bytes_is_trimmed() -> Result<()> {
        let buf = vec![9u8; 20];
        assert_eq!(pack_rows(&buf, 2, 2, 0, PixelFormat::Rgb24)?.len(), 12);
        assert_eq!(pack_rows(&buf, 2, 2, 6, PixelFormat::Rgb24)?.len(), 12);
        Ok(())
    }

    #[test]
    fn short_stride_or_buffer_is_rejected() {
        assert!(pack_rows(&[0u8; 12], 2, 2, 4, PixelFormat::Rgb24).is_err());
        assert!(pack_rows(&[0u8; 10], 2, 2, 8, PixelFormat::Rgb24).is_err());
    }

    #[test]
    fn rgb_pass_through_validates_length() -> Result<()> {
        let pixels = vec![1u8; 9];
        let rgb = normalize_to_rgb(&pixels, 1, 3, PixelFormat::Rgb24)?;
        assert_eq!(rgb, pixels);

        assert!(normalize_to_rgb(&pixels, 2, 3, PixelFormat::Rgb24).is_err());
        Ok(())
    }
}
