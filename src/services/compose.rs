use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, Rgb, RgbImage};

/// Fixed 3:4 canvas for mannequin grids.
pub const CANVAS_WIDTH: u32 = 1536;
pub const CANVAS_HEIGHT: u32 = 2048;

/// Gap between cells and around the canvas edge, in pixels.
const CELL_PADDING: u32 = 24;

const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub cols: u32,
    pub rows: u32,
}

/// Best-packing grid for `n` cells on the 3:4 canvas. Hand-tuned table up
/// to 12; `cols = ceil(sqrt(n)), rows = ceil(n / cols)` beyond.
pub fn grid_layout(n: usize) -> GridLayout {
    let (cols, rows) = match n {
        0 | 1 => (1, 1),
        2 => (1, 2),
        3 | 4 => (2, 2),
        5 | 6 => (2, 3),
        7..=9 => (3, 3),
        10..=12 => (3, 4),
        _ => {
            let cols = (n as f64).sqrt().ceil() as u32;
            let rows = (n as u32).div_ceil(cols);
            (cols, rows)
        }
    };
    GridLayout { cols, rows }
}

/// Flatten `images` into a single white-background grid. Each image is
/// resized to fit its cell without cropping and centered (letterboxed).
/// Output is an encoded JPEG.
pub fn compose_grid(images: &[DynamicImage]) -> Result<Vec<u8>, ComposeError> {
    if images.is_empty() {
        return Err(ComposeError::EmptyInput);
    }

    let layout = grid_layout(images.len());
    let cell_w = (CANVAS_WIDTH - (layout.cols + 1) * CELL_PADDING) / layout.cols;
    let cell_h = (CANVAS_HEIGHT - (layout.rows + 1) * CELL_PADDING) / layout.rows;

    let mut canvas = RgbImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, Rgb([255, 255, 255]));

    for (i, source) in images.iter().enumerate() {
        let col = i as u32 % layout.cols;
        let row = i as u32 / layout.cols;

        // resize (not resize_exact) preserves aspect within the cell.
        let fitted = source.resize(cell_w, cell_h, imageops::FilterType::Lanczos3).to_rgb8();

        let cell_x = CELL_PADDING + col * (cell_w + CELL_PADDING);
        let cell_y = CELL_PADDING + row * (cell_h + CELL_PADDING);
        let x = cell_x + (cell_w - fitted.width()) / 2;
        let y = cell_y + (cell_h - fitted.height()) / 2;

        imageops::overlay(&mut canvas, &fitted, x as i64, y as i64);
    }

    encode_jpeg(&DynamicImage::ImageRgb8(canvas))
}

/// Encode as baseline JPEG at the pipeline's standard quality.
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, ComposeError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    // JPEG has no alpha channel; flatten first.
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(ComposeError::Image)?;
    Ok(buf)
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("no images to composite")]
    EmptyInput,

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_table_small_counts() {
        assert_eq!(grid_layout(1), GridLayout { cols: 1, rows: 1 });
        assert_eq!(grid_layout(2), GridLayout { cols: 1, rows: 2 });
        assert_eq!(grid_layout(3), GridLayout { cols: 2, rows: 2 });
        assert_eq!(grid_layout(4), GridLayout { cols: 2, rows: 2 });
        assert_eq!(grid_layout(5), GridLayout { cols: 2, rows: 3 });
        assert_eq!(grid_layout(6), GridLayout { cols: 2, rows: 3 });
        assert_eq!(grid_layout(7), GridLayout { cols: 3, rows: 3 });
        assert_eq!(grid_layout(9), GridLayout { cols: 3, rows: 3 });
        assert_eq!(grid_layout(10), GridLayout { cols: 3, rows: 4 });
        assert_eq!(grid_layout(12), GridLayout { cols: 3, rows: 4 });
    }

    #[test]
    fn layout_falls_back_to_ceil_sqrt() {
        // 13 -> cols = ceil(sqrt(13)) = 4, rows = ceil(13/4) = 4
        assert_eq!(grid_layout(13), GridLayout { cols: 4, rows: 4 });
        // 17 -> cols = 5, rows = 4
        assert_eq!(grid_layout(17), GridLayout { cols: 5, rows: 4 });
    }

    #[test]
    fn composes_flattened_jpeg_canvas() {
        let images: Vec<DynamicImage> = (0..3)
            .map(|i| {
                DynamicImage::ImageRgb8(RgbImage::from_pixel(
                    200 + i * 40,
                    300,
                    Rgb([10 * i as u8, 128, 200]),
                ))
            })
            .collect();

        let jpeg = compose_grid(&images).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), CANVAS_WIDTH);
        assert_eq!(decoded.height(), CANVAS_HEIGHT);
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(compose_grid(&[]), Err(ComposeError::EmptyInput)));
    }
}
