//! # Image Optimizer Module
//!
//! Questo modulo ricomprime una singola immagine raster estratta da un PDF.
//!
//! ## Responsabilità:
//! - Calcola le dimensioni target in base al DPI dichiarato e al DPI massimo
//! - Decodifica gli stream immagine (DCT/JPEG, Flate, non compressi)
//! - Ricodifica con il codec adatto al contenuto
//! - Garantisce che il risultato non sia mai più grande dell'originale
//!
//! ## Strategie per contenuto:
//!
//! | Contenuto | Resample | Codec di output |
//! |-----------|----------|-----------------|
//! | Foto 8-bit Gray/RGB (DCT) | ✅ | JPEG alla qualità configurata |
//! | Foto 8-bit Gray/RGB (Flate ≥ soglia, senza SMask) | ✅ | JPEG |
//! | Foto 8-bit Gray/RGB (Flate piccola o con SMask) | ✅ | Flate (lossless) |
//! | Indexed / 1-bit / color-key mask / CMYK raw | ❌ | Flate (lossless) |
//! | CMYK o altri spazi colore in DCT | ❌ | Nessuno (fedeltà colore) |
//!
//! ## Politica DPI:
//! - Se `declared_dpi > max_dpi`: scala = `max_dpi / declared_dpi` su entrambi i lati,
//!   arrotondamento half-up, minimo 1px per lato
//! - DPI assente o zero: nessun resample, solo ricompressione
//! - Mai upsampling
//!
//! ## Errori:
//! - Stream corrotti o filtri non supportati → `ImageError`, confinato all'immagine;
//!   il rewriter lascia l'immagine invariata e prosegue

use crate::config::Config;
use crate::error::ImageError;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GrayImage, ImageFormat, RgbImage};
use std::io::{Read, Write};
use tracing::debug;

/// How an image stream is stored in the PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEncoding {
    /// `/DCTDecode` (baseline or progressive JPEG)
    Dct,
    /// `/FlateDecode` without predictors
    Flate,
    /// No filter
    Uncompressed,
    /// Anything this optimizer cannot decode (JBIG2, CCITT, JPX, predictors, chains)
    Unsupported(String),
}

/// Color model of the samples, as declared by `/ColorSpace`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
    Indexed,
    Lab,
    /// `/DeviceN` with this many colorants; `/Separation` is `DeviceN(1)`
    DeviceN(usize),
    /// Component count unknown: samples cannot be sized, the image is never touched
    Other(String),
}

impl ColorModel {
    /// Samples per pixel, `None` when it cannot be known
    pub fn components(&self) -> Option<usize> {
        match self {
            ColorModel::Gray | ColorModel::Indexed => Some(1),
            ColorModel::Rgb | ColorModel::Lab => Some(3),
            ColorModel::Cmyk => Some(4),
            ColorModel::DeviceN(n) if *n > 0 => Some(*n),
            ColorModel::DeviceN(_) | ColorModel::Other(_) => None,
        }
    }
}

/// One raster resource of a PDF, as read by the optimizer
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Stream bytes exactly as stored in the document
    pub data: Vec<u8>,
    pub encoding: StreamEncoding,
    pub width: u32,
    pub height: u32,
    pub color: ColorModel,
    pub bits_per_component: u8,
    /// Effective placement DPI; `None` when the image is never drawn
    pub declared_dpi: Option<f32>,
    pub has_soft_mask: bool,
    /// `/Mask` given as a color-key array, which needs exact sample values
    pub has_color_key_mask: bool,
}

/// Output codec of a re-encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    Dct,
    Flate,
}

/// A successfully re-encoded image, always smaller than its source
#[derive(Debug, Clone)]
pub struct ReencodedImage {
    pub data: Vec<u8>,
    pub encoding: OutputEncoding,
    pub width: u32,
    pub height: u32,
}

/// Why an image is reported back unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnchangedReason {
    /// Re-encoding did not produce fewer bytes
    NoImprovement,
    /// No available codec keeps the color space intact
    ColorFidelity,
}

/// Result of optimizing one image
#[derive(Debug, Clone)]
pub enum Optimization {
    Reencoded(ReencodedImage),
    Unchanged(UnchangedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// 8-bit gray/RGB: may be resampled, may go lossy
    Photographic,
    /// Exact samples matter: keep pixel count, lossless only
    Lossless,
    /// Leave alone
    Skip(UnchangedReason),
}

/// Re-encodes embedded images under quality/DPI constraints
#[derive(Debug, Clone)]
pub struct ImageOptimizer {
    quality: u8,
    max_dpi: u32,
    lossy_flate_threshold: usize,
}

impl ImageOptimizer {
    /// Creates a new optimizer.
    ///
    /// # Arguments
    /// * `quality` - JPEG quality used for photographic content (1-100)
    /// * `max_dpi` - Placement DPI above which images are downsampled
    /// * `lossy_flate_threshold` - Minimum stored size for a lossless 8-bit
    ///   gray/RGB image to be moved to JPEG
    pub fn new(quality: u8, max_dpi: u32, lossy_flate_threshold: usize) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            max_dpi,
            lossy_flate_threshold,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.image_quality,
            config.max_dpi,
            config.lossy_flate_threshold,
        )
    }

    /// Optimizes a single embedded image.
    ///
    /// The returned `Optimization::Reencoded` always holds fewer bytes than
    /// `image.data`; otherwise the image is reported as unchanged and the
    /// caller keeps the original stream.
    ///
    /// # Errors
    /// Returns an `ImageError` if the stream is corrupt, uses a filter this
    /// optimizer cannot decode, or the encoder fails. The error concerns this
    /// image only.
    pub fn optimize(&self, image: &EmbeddedImage) -> Result<Optimization, ImageError> {
        if let StreamEncoding::Unsupported(filter) = &image.encoding {
            return Err(ImageError::Unsupported(filter.clone()));
        }
        if image.width == 0 || image.height == 0 {
            return Err(ImageError::Corrupt(format!(
                "invalid dimensions {}x{}",
                image.width, image.height
            )));
        }

        let candidate = match self.route(image) {
            Route::Skip(reason) => {
                debug!("Skipping image ({:?}): {:?}", image.color, reason);
                return Ok(Optimization::Unchanged(reason));
            }
            Route::Lossless => self.reencode_lossless(image)?,
            Route::Photographic => self.reencode_photographic(image)?,
        };

        if candidate.data.len() < image.data.len() {
            debug!(
                "Image {}x{} -> {}x{} ({:?}): {} -> {} bytes",
                image.width,
                image.height,
                candidate.width,
                candidate.height,
                candidate.encoding,
                image.data.len(),
                candidate.data.len()
            );
            Ok(Optimization::Reencoded(candidate))
        } else {
            debug!(
                "Re-encoded image not smaller ({} >= {} bytes), keeping original",
                candidate.data.len(),
                image.data.len()
            );
            Ok(Optimization::Unchanged(UnchangedReason::NoImprovement))
        }
    }

    /// Pixel size the image would be resampled to, ignoring its content route
    pub fn target_dimensions_for(&self, image: &EmbeddedImage) -> (u32, u32) {
        target_dimensions(image.width, image.height, image.declared_dpi, self.max_dpi)
    }

    fn route(&self, image: &EmbeddedImage) -> Route {
        let photographic = image.bits_per_component == 8
            && matches!(image.color, ColorModel::Gray | ColorModel::Rgb)
            && !image.has_color_key_mask;

        if photographic {
            Route::Photographic
        } else if image.color.components().is_none() {
            Route::Skip(UnchangedReason::ColorFidelity)
        } else if image.encoding == StreamEncoding::Dct {
            // CMYK/Lab/etc. JPEGs would need a lossy round trip through RGB
            Route::Skip(UnchangedReason::ColorFidelity)
        } else {
            Route::Lossless
        }
    }

    fn reencode_lossless(&self, image: &EmbeddedImage) -> Result<ReencodedImage, ImageError> {
        let samples = decode_samples(image)?;
        let expected = expected_sample_bytes(image)?;
        // Re-deflated streams carry exactly the decoded samples
        if samples.len() != expected {
            return Err(ImageError::Corrupt(format!(
                "expected {} sample bytes, found {}",
                expected,
                samples.len()
            )));
        }

        Ok(ReencodedImage {
            data: deflate(&samples)?,
            encoding: OutputEncoding::Flate,
            width: image.width,
            height: image.height,
        })
    }

    fn reencode_photographic(&self, image: &EmbeddedImage) -> Result<ReencodedImage, ImageError> {
        let mut pixels = decode_pixels(image)?;

        let (target_width, target_height) =
            target_dimensions(image.width, image.height, image.declared_dpi, self.max_dpi);
        if (target_width, target_height) != (pixels.width(), pixels.height()) {
            debug!(
                "Resampling {}x{} -> {}x{} (declared {:?} dpi, max {})",
                pixels.width(),
                pixels.height(),
                target_width,
                target_height,
                image.declared_dpi,
                self.max_dpi
            );
            pixels = pixels.resize_exact(target_width, target_height, FilterType::Lanczos3);
        }

        let go_lossy = image.encoding == StreamEncoding::Dct
            || (!image.has_soft_mask && image.data.len() >= self.lossy_flate_threshold);

        let (data, encoding) = if go_lossy {
            (encode_jpeg(&pixels, self.quality)?, OutputEncoding::Dct)
        } else {
            (deflate(pixels.as_bytes())?, OutputEncoding::Flate)
        };

        Ok(ReencodedImage {
            data,
            encoding,
            width: pixels.width(),
            height: pixels.height(),
        })
    }
}

/// Pixel dimensions after enforcing `max_dpi`.
///
/// A missing, zero or non-finite `declared_dpi` leaves the size unchanged.
pub fn target_dimensions(
    width: u32,
    height: u32,
    declared_dpi: Option<f32>,
    max_dpi: u32,
) -> (u32, u32) {
    match declared_dpi {
        Some(dpi) if dpi.is_finite() && dpi > max_dpi as f32 => {
            let scale = max_dpi as f64 / dpi as f64;
            let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
            (scaled(width), scaled(height))
        }
        _ => (width, height),
    }
}

fn decode_samples(image: &EmbeddedImage) -> Result<Vec<u8>, ImageError> {
    match &image.encoding {
        StreamEncoding::Flate => {
            let mut decoder = ZlibDecoder::new(&image.data[..]);
            let mut samples = Vec::new();
            decoder
                .read_to_end(&mut samples)
                .map_err(|e| ImageError::Corrupt(format!("FlateDecode failed: {}", e)))?;
            Ok(samples)
        }
        StreamEncoding::Uncompressed => Ok(image.data.clone()),
        StreamEncoding::Dct => Err(ImageError::Unsupported(
            "raw samples requested from a DCT stream".to_string(),
        )),
        StreamEncoding::Unsupported(filter) => Err(ImageError::Unsupported(filter.clone())),
    }
}

fn expected_sample_bytes(image: &EmbeddedImage) -> Result<usize, ImageError> {
    let components = image.color.components().ok_or_else(|| {
        ImageError::Unsupported(format!("unknown component count for {:?}", image.color))
    })? as u64;
    let row_bits = image.width as u64 * components * image.bits_per_component as u64;
    let row_bytes = row_bits.div_ceil(8);
    row_bytes
        .checked_mul(image.height as u64)
        .and_then(|total| usize::try_from(total).ok())
        .ok_or_else(|| ImageError::Corrupt("image dimensions overflow".to_string()))
}

fn decode_pixels(image: &EmbeddedImage) -> Result<DynamicImage, ImageError> {
    if image.encoding == StreamEncoding::Dct {
        let decoded = image::load_from_memory_with_format(&image.data, ImageFormat::Jpeg)?;
        return Ok(match image.color {
            ColorModel::Gray => DynamicImage::ImageLuma8(decoded.to_luma8()),
            _ => DynamicImage::ImageRgb8(decoded.to_rgb8()),
        });
    }

    let samples = decode_samples(image)?;
    let expected = expected_sample_bytes(image)?;
    if samples.len() < expected {
        return Err(ImageError::Corrupt(format!(
            "expected {} sample bytes, found {}",
            expected,
            samples.len()
        )));
    }

    let samples = samples[..expected].to_vec();
    let pixels = match image.color {
        ColorModel::Gray => GrayImage::from_raw(image.width, image.height, samples)
            .map(DynamicImage::ImageLuma8),
        _ => RgbImage::from_raw(image.width, image.height, samples).map(DynamicImage::ImageRgb8),
    };
    pixels.ok_or_else(|| ImageError::Corrupt("sample buffer does not match dimensions".to_string()))
}

fn encode_jpeg(pixels: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let color_type = match pixels {
        DynamicImage::ImageLuma8(_) => ColorType::L8,
        _ => ColorType::Rgb8,
    };

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode(pixels.as_bytes(), pixels.width(), pixels.height(), color_type)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buffer)
}

fn deflate(samples: &[u8]) -> Result<Vec<u8>, ImageError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(samples)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    encoder.finish().map_err(|e| ImageError::Encode(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Deterministic noisy gradient that JPEG cannot compress trivially
    pub fn noisy_rgb(width: u32, height: u32) -> RgbImage {
        let mut seed: u32 = 0x1234_5678;
        RgbImage::from_fn(width, height, |x, y| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (seed >> 24) as u8 / 16;
            image::Rgb([
                ((x * 255 / width.max(1)) as u8).wrapping_add(noise),
                ((y * 255 / height.max(1)) as u8).wrapping_add(noise),
                noise.wrapping_mul(3),
            ])
        })
    }

    pub fn jpeg(pixels: &RgbImage, quality: u8) -> Vec<u8> {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality)
            .encode(pixels.as_raw(), pixels.width(), pixels.height(), ColorType::Rgb8)
            .unwrap();
        buffer
    }

    pub fn stored_zlib(samples: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::none());
        encoder.write_all(samples).unwrap();
        encoder.finish().unwrap()
    }

    pub fn photo(data: Vec<u8>, width: u32, height: u32, dpi: Option<f32>) -> EmbeddedImage {
        EmbeddedImage {
            data,
            encoding: StreamEncoding::Dct,
            width,
            height,
            color: ColorModel::Rgb,
            bits_per_component: 8,
            declared_dpi: dpi,
            has_soft_mask: false,
            has_color_key_mask: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn optimizer() -> ImageOptimizer {
        ImageOptimizer::new(90, 250, 200_000)
    }

    fn reencoded(result: Optimization) -> ReencodedImage {
        match result {
            Optimization::Reencoded(image) => image,
            other => panic!("expected re-encoded image, got {:?}", other),
        }
    }

    #[test]
    fn test_target_dimensions_downsamples_to_max_dpi() {
        assert_eq!(target_dimensions(1200, 600, Some(300.0), 250), (1000, 500));
        assert_eq!(target_dimensions(3000, 2000, Some(600.0), 150), (750, 500));
    }

    #[test]
    fn test_target_dimensions_rounds_half_up_with_one_pixel_floor() {
        // 6 * 0.25 = 1.5 -> 2
        assert_eq!(target_dimensions(6, 10, Some(400.0), 100), (2, 3));
        assert_eq!(target_dimensions(1, 1, Some(600.0), 50), (1, 1));
    }

    #[test]
    fn test_target_dimensions_never_upsamples() {
        assert_eq!(target_dimensions(800, 600, Some(100.0), 250), (800, 600));
        assert_eq!(target_dimensions(800, 600, Some(250.0), 250), (800, 600));
        assert_eq!(target_dimensions(800, 600, None, 250), (800, 600));
        assert_eq!(target_dimensions(800, 600, Some(0.0), 250), (800, 600));
        assert_eq!(target_dimensions(800, 600, Some(f32::INFINITY), 250), (800, 600));
    }

    #[test]
    fn test_photographic_jpeg_downsampled_and_smaller() {
        let source = jpeg(&noisy_rgb(600, 400), 100);
        let image = photo(source.clone(), 600, 400, Some(300.0));

        let result = reencoded(ImageOptimizer::new(90, 150, 200_000).optimize(&image).unwrap());
        assert_eq!((result.width, result.height), (300, 200));
        assert_eq!(result.encoding, OutputEncoding::Dct);
        assert!(result.data.len() < source.len());
    }

    #[test]
    fn test_missing_dpi_recompresses_without_resampling() {
        let source = jpeg(&noisy_rgb(320, 240), 100);
        let image = photo(source.clone(), 320, 240, None);

        let result = reencoded(ImageOptimizer::new(60, 250, 200_000).optimize(&image).unwrap());
        assert_eq!((result.width, result.height), (320, 240));
        assert!(result.data.len() < source.len());
    }

    #[test]
    fn test_corrupt_jpeg_is_an_image_error() {
        let image = photo(vec![0xFF, 0xD8, 0x00, 0x13, 0x37], 64, 64, Some(300.0));
        assert!(matches!(
            optimizer().optimize(&image),
            Err(ImageError::Decode(_))
        ));
    }

    #[test]
    fn test_truncated_flate_is_corrupt() {
        let mut image = photo(vec![0x78, 0x9C, 0x01, 0x02], 8, 8, None);
        image.encoding = StreamEncoding::Flate;
        assert!(matches!(
            optimizer().optimize(&image),
            Err(ImageError::Corrupt(_))
        ));
    }

    #[test]
    fn test_unsupported_filter_reported() {
        let mut image = photo(vec![1, 2, 3], 8, 8, None);
        image.encoding = StreamEncoding::Unsupported("JBIG2Decode".to_string());
        assert!(matches!(
            optimizer().optimize(&image),
            Err(ImageError::Unsupported(_))
        ));
    }

    #[test]
    fn test_cmyk_jpeg_left_for_color_fidelity() {
        let mut image = photo(jpeg(&noisy_rgb(64, 64), 100), 64, 64, Some(600.0));
        image.color = ColorModel::Cmyk;
        assert!(matches!(
            optimizer().optimize(&image).unwrap(),
            Optimization::Unchanged(UnchangedReason::ColorFidelity)
        ));
    }

    fn flate_image(samples: &[u8], width: u32, height: u32, color: ColorModel) -> EmbeddedImage {
        EmbeddedImage {
            data: stored_zlib(samples),
            encoding: StreamEncoding::Flate,
            width,
            height,
            color,
            bits_per_component: 8,
            declared_dpi: Some(600.0),
            has_soft_mask: false,
            has_color_key_mask: false,
        }
    }

    fn inflate(data: &[u8]) -> Vec<u8> {
        let mut samples = Vec::new();
        ZlibDecoder::new(data).read_to_end(&mut samples).unwrap();
        samples
    }

    #[test]
    fn test_lab_image_keeps_every_sample() {
        let samples: Vec<u8> = (0..100u32 * 100 * 3).map(|i| (i % 11) as u8).collect();
        let image = flate_image(&samples, 100, 100, ColorModel::Lab);

        let result = reencoded(optimizer().optimize(&image).unwrap());
        assert_eq!((result.width, result.height), (100, 100));
        assert_eq!(result.encoding, OutputEncoding::Flate);
        assert_eq!(inflate(&result.data), samples);
    }

    #[test]
    fn test_device_n_image_keeps_every_sample() {
        let samples: Vec<u8> = (0..50u32 * 40 * 5).map(|i| (i % 13) as u8).collect();
        let image = flate_image(&samples, 50, 40, ColorModel::DeviceN(5));

        let result = reencoded(optimizer().optimize(&image).unwrap());
        assert_eq!(inflate(&result.data), samples);
    }

    #[test]
    fn test_unknown_color_space_left_unchanged() {
        let samples: Vec<u8> = (0..100u32 * 100 * 3).map(|i| (i % 11) as u8).collect();
        for color in [ColorModel::Other("ICCBased".to_string()), ColorModel::DeviceN(0)] {
            let image = flate_image(&samples, 100, 100, color);
            assert!(matches!(
                optimizer().optimize(&image).unwrap(),
                Optimization::Unchanged(UnchangedReason::ColorFidelity)
            ));
        }
    }

    #[test]
    fn test_sample_count_mismatch_is_corrupt() {
        // Two rows more than a 3-component 10x10 image holds
        let samples = vec![7u8; 10 * 12 * 3];
        let image = flate_image(&samples, 10, 10, ColorModel::Lab);
        assert!(matches!(
            optimizer().optimize(&image),
            Err(ImageError::Corrupt(_))
        ));
    }

    #[test]
    fn test_indexed_image_never_resampled() {
        let samples: Vec<u8> = (0..200u32 * 100).map(|i| (i % 7) as u8).collect();
        let image = EmbeddedImage {
            data: stored_zlib(&samples),
            encoding: StreamEncoding::Flate,
            width: 200,
            height: 100,
            color: ColorModel::Indexed,
            bits_per_component: 8,
            declared_dpi: Some(1200.0),
            has_soft_mask: false,
            has_color_key_mask: false,
        };

        let result = reencoded(optimizer().optimize(&image).unwrap());
        assert_eq!((result.width, result.height), (200, 100));
        assert_eq!(result.encoding, OutputEncoding::Flate);
        assert!(result.data.len() < image.data.len());
    }

    #[test]
    fn test_one_bit_image_stays_lossless() {
        // 64x64 at 1 bpc = 8 bytes per row
        let samples = vec![0b1010_1010u8; 8 * 64];
        let image = EmbeddedImage {
            data: samples.clone(),
            encoding: StreamEncoding::Uncompressed,
            width: 64,
            height: 64,
            color: ColorModel::Gray,
            bits_per_component: 1,
            declared_dpi: Some(2400.0),
            has_soft_mask: false,
            has_color_key_mask: false,
        };

        let result = reencoded(optimizer().optimize(&image).unwrap());
        assert_eq!((result.width, result.height), (64, 64));
        assert_eq!(result.encoding, OutputEncoding::Flate);
    }

    #[test]
    fn test_already_optimal_stream_reports_no_improvement() {
        let samples: Vec<u8> = (0..64u32 * 64).map(|i| (i % 3) as u8).collect();
        let image = EmbeddedImage {
            data: deflate(&samples).unwrap(),
            encoding: StreamEncoding::Flate,
            width: 64,
            height: 64,
            color: ColorModel::Indexed,
            bits_per_component: 8,
            declared_dpi: None,
            has_soft_mask: false,
            has_color_key_mask: false,
        };

        assert!(matches!(
            optimizer().optimize(&image).unwrap(),
            Optimization::Unchanged(UnchangedReason::NoImprovement)
        ));
    }

    #[test]
    fn test_large_flate_photo_goes_lossy_unless_soft_masked() {
        let pixels = noisy_rgb(400, 300);
        let mut image = photo(stored_zlib(pixels.as_raw()), 400, 300, None);
        image.encoding = StreamEncoding::Flate;

        let lossy = reencoded(optimizer().optimize(&image).unwrap());
        assert_eq!(lossy.encoding, OutputEncoding::Dct);

        image.has_soft_mask = true;
        let lossless = reencoded(optimizer().optimize(&image).unwrap());
        assert_eq!(lossless.encoding, OutputEncoding::Flate);
    }

    #[test]
    fn test_small_flate_photo_stays_lossless() {
        let pixels = RgbImage::from_fn(40, 30, |x, y| image::Rgb([x as u8, y as u8, 128]));
        let mut image = photo(stored_zlib(pixels.as_raw()), 40, 30, None);
        image.encoding = StreamEncoding::Flate;

        let result = reencoded(optimizer().optimize(&image).unwrap());
        assert_eq!(result.encoding, OutputEncoding::Flate);
    }
}
