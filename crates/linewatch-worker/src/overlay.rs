//! Mask overlay rendering.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};
use linewatch_ml_client::SegmentMask;

use crate::error::{PipelineError, PipelineResult};

/// Render a mask as RGBA: `color` at full opacity where set, fully
/// transparent elsewhere.
pub fn render_overlay(mask: &SegmentMask, color: [u8; 3]) -> RgbaImage {
    let [r, g, b] = color;
    let gray = mask.as_gray();
    RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > 0 {
            Rgba([r, g, b, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Render and write a mask overlay PNG.
pub async fn write_overlay(mask: &SegmentMask, color: [u8; 3], path: &Path) -> PipelineResult<()> {
    let overlay = render_overlay(mask, color);
    let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Cursor::new(Vec::new());
        overlay.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    })
    .await
    .map_err(|e| PipelineError::stage_fatal(format!("overlay encoder task: {}", e)))?
    .map_err(|e| PipelineError::stage_fatal(format!("encode {}: {}", path.display(), e)))?;

    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| PipelineError::Storage(e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_colors_and_alpha() {
        let mask = SegmentMask::from_fn(3, 2, |x, y| x == 1 && y == 0);
        let overlay = render_overlay(&mask, [255, 0, 0]);

        assert_eq!(overlay.dimensions(), (3, 2));
        assert_eq!(overlay.get_pixel(1, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(overlay.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(overlay.get_pixel(2, 1), &Rgba([0, 0, 0, 0]));
    }

    #[tokio::test]
    async fn test_write_overlay_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_mask.png");
        let mask = SegmentMask::from_fn(4, 4, |x, _| x < 2);

        write_overlay(&mask, [0, 255, 0], &path).await.unwrap();

        let written = image::open(&path).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (4, 4));
        assert_eq!(written.get_pixel(0, 3), &Rgba([0, 255, 0, 255]));
        assert_eq!(written.get_pixel(3, 3)[3], 0);
    }
}
