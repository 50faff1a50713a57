//! OCR collaborators: page image sources and recognition engines

use crate::config::IMAGE_PLACEHOLDER;
use crate::pdf::load_document;
use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, ImageOutputFormat, RgbImage};
use lopdf::{Dictionary, Document as PdfDocument, Object, ObjectId, Stream};
use paperclerk_domain::traits::{OcrEngine, OcrOutput};
use paperclerk_domain::Confidence;
use std::io::{Cursor, Read, Write};
use tracing::debug;

/// Supplies the image of a page for OCR
pub trait PageImageSource {
    /// Image bytes of the page at `page_index` (0-based)
    ///
    /// `Ok(None)` means the page carries no image that can be recognized.
    fn page_image(&self, pdf: &[u8], page_index: usize) -> Result<Option<Vec<u8>>, String>;
}

/// Pulls the largest embedded image XObject of a page
///
/// Scanners embed one image per page. JPEG (`DCTDecode`) and JPEG 2000
/// streams are handed over as they are; Flate-compressed raw pixels are
/// inflated and re-encoded as PNG since OCR engines need an image file.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedImageSource;

impl PageImageSource for EmbeddedImageSource {
    fn page_image(&self, pdf: &[u8], page_index: usize) -> Result<Option<Vec<u8>>, String> {
        let doc = load_document(pdf).map_err(|e| e.to_string())?;
        let page_ids: Vec<ObjectId> = doc.page_iter().collect();
        let page_id = *page_ids.get(page_index).ok_or_else(|| {
            format!(
                "Page {} not found (document has {} pages)",
                page_index + 1,
                page_ids.len()
            )
        })?;

        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| format!("Page object error: {}", e))?;

        let Some(xobjects) = resolve_dict(&doc, page, b"Resources")
            .and_then(|resources| resolve_dict(&doc, resources, b"XObject"))
        else {
            return Ok(None);
        };

        let largest = xobjects
            .iter()
            .filter_map(|(_, obj)| match resolve(&doc, obj) {
                Object::Stream(stream) if is_image(&stream.dict) => {
                    match image_file(&doc, stream) {
                        Ok(image) => image,
                        Err(e) => {
                            debug!(page = page_index + 1, error = %e, "Skipping page image");
                            None
                        }
                    }
                }
                _ => None,
            })
            .max_by_key(Vec::len);

        debug!(
            page = page_index + 1,
            found = largest.is_some(),
            "Looked up embedded page image"
        );
        Ok(largest)
    }
}

fn resolve<'a>(doc: &'a PdfDocument, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn resolve_dict<'a>(doc: &'a PdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    match resolve(doc, dict.get(key).ok()?) {
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
}

/// Filter names in decoding order
fn filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(filters)) => filters
            .iter()
            .filter_map(|f| match f {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode parameters of the filter at `index`
fn decode_parms<'a>(doc: &'a PdfDocument, dict: &'a Dictionary, index: usize) -> Option<&'a Dictionary> {
    match resolve(doc, dict.get(b"DecodeParms").ok()?) {
        Object::Dictionary(parms) if index == 0 => Some(parms),
        Object::Array(parms) => match resolve(doc, parms.get(index)?) {
            Object::Dictionary(parms) => Some(parms),
            _ => None,
        },
        _ => None,
    }
}

/// Turn an image XObject into bytes of an image file
///
/// `Ok(None)` for encodings OCR cannot use (CCITT, JBIG2, indexed colour).
fn image_file(doc: &PdfDocument, stream: &Stream) -> Result<Option<Vec<u8>>, String> {
    let filters = filters(&stream.dict);
    let mut data = stream.content.clone();

    for (index, filter) in filters.iter().enumerate() {
        let last = index + 1 == filters.len();
        match filter.as_slice() {
            b"FlateDecode" => {
                data = inflate(&data)?;
                if let Some(parms) = decode_parms(doc, &stream.dict, index) {
                    data = undo_predictor(data, parms)?;
                }
            }
            // The content of a DCT or JPX stream is a complete image file
            b"DCTDecode" | b"JPXDecode" if last => return Ok(Some(data)),
            other => {
                debug!(filter = %String::from_utf8_lossy(other), "Unsupported image filter");
                return Ok(None);
            }
        }
    }

    raw_pixels_to_png(doc, &stream.dict, data)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut inflated = Vec::with_capacity(data.len() * 2);
    ZlibDecoder::new(data)
        .read_to_end(&mut inflated)
        .map_err(|e| format!("FlateDecode failed: {}", e))?;
    Ok(inflated)
}

fn int_entry(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).and_then(Object::as_i64).ok()
}

/// Reverse PNG row predictors (`Predictor` 10 to 15)
fn undo_predictor(data: Vec<u8>, parms: &Dictionary) -> Result<Vec<u8>, String> {
    let predictor = int_entry(parms, b"Predictor").unwrap_or(1);
    if predictor < 10 {
        if predictor == 1 {
            return Ok(data);
        }
        return Err(format!("Unsupported predictor {}", predictor));
    }

    let colors = int_entry(parms, b"Colors").unwrap_or(1).max(1) as usize;
    let bpc = int_entry(parms, b"BitsPerComponent").unwrap_or(8).max(1) as usize;
    let columns = int_entry(parms, b"Columns").unwrap_or(1).max(1) as usize;
    let bpp = (colors * bpc).div_ceil(8).max(1);
    let row_len = (colors * bpc * columns).div_ceil(8);

    let mut out = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];
    for row in data.chunks(row_len + 1) {
        let (&filter, encoded) = row.split_first().ok_or("Empty predictor row")?;
        if encoded.len() < row_len {
            break;
        }
        let mut current = encoded.to_vec();
        for i in 0..row_len {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            let predicted = match filter {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => return Err(format!("Unknown PNG row filter {}", other)),
            };
            current[i] = current[i].wrapping_add(predicted);
        }
        out.extend_from_slice(&current);
        previous = current;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let (pa, pb, pc) = ((p - i16::from(a)).abs(), (p - i16::from(b)).abs(), (p - i16::from(c)).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Number of colour components, `None` for colour spaces OCR cannot use
fn components(doc: &PdfDocument, dict: &Dictionary) -> Option<usize> {
    let Ok(space) = dict.get(b"ColorSpace") else {
        // Image masks have no colour space and one bit per pixel
        return Some(1);
    };
    match resolve(doc, space) {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        Object::Array(parts) => match parts.first() {
            Some(Object::Name(name)) if name == b"ICCBased" => {
                let n = parts.get(1).map(|icc| resolve(doc, icc)).and_then(|icc| match icc {
                    Object::Stream(icc) => int_entry(&icc.dict, b"N"),
                    _ => None,
                });
                n.and_then(|n| usize::try_from(n).ok())
            }
            Some(Object::Name(name)) if name == b"CalGray" => Some(1),
            Some(Object::Name(name)) if name == b"CalRGB" => Some(3),
            _ => None,
        },
        _ => None,
    }
}

/// Re-encode raw pixel rows as PNG
fn raw_pixels_to_png(
    doc: &PdfDocument,
    dict: &Dictionary,
    pixels: Vec<u8>,
) -> Result<Option<Vec<u8>>, String> {
    let width = int_entry(dict, b"Width").ok_or("Image without Width")?;
    let height = int_entry(dict, b"Height").ok_or("Image without Height")?;
    let (width, height) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(format!("Invalid image size {}x{}", width, height)),
    };
    let bpc = int_entry(dict, b"BitsPerComponent").unwrap_or(8);
    let Some(channels) = components(doc, dict) else {
        debug!("Unsupported image colour space");
        return Ok(None);
    };

    let image = match (channels, bpc) {
        (1, 1) => {
            // Bilevel: 1 is white unless the Decode array inverts it
            let inverted = matches!(
                dict.get(b"Decode"),
                Ok(Object::Array(decode)) if decode.first().and_then(|d| d.as_i64().ok()) == Some(1)
            );
            let gray = expand_bits(&pixels, width as usize, height as usize, inverted)?;
            GrayImage::from_raw(width, height, gray).map(DynamicImage::ImageLuma8)
        }
        (1, 8) => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        (3, 8) => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        (4, 8) => RgbImage::from_raw(width, height, cmyk_to_rgb(&pixels))
            .map(DynamicImage::ImageRgb8),
        _ => {
            debug!(channels, bpc, "Unsupported image sample layout");
            return Ok(None);
        }
    };
    let image = image.ok_or_else(|| format!("Pixel data too short for {}x{}", width, height))?;

    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageOutputFormat::Png)
        .map_err(|e| format!("PNG encoding failed: {}", e))?;
    Ok(Some(png.into_inner()))
}

/// One gray byte per pixel from rows of packed bits
fn expand_bits(packed: &[u8], width: usize, height: usize, inverted: bool) -> Result<Vec<u8>, String> {
    let row_len = width.div_ceil(8);
    if packed.len() < row_len * height {
        return Err(format!("Pixel data too short for {}x{}", width, height));
    }
    let mut gray = Vec::with_capacity(width * height);
    for row in packed.chunks(row_len).take(height) {
        for x in 0..width {
            let bit = (row[x / 8] >> (7 - x % 8)) & 1 == 1;
            gray.push(if bit != inverted { 255 } else { 0 });
        }
    }
    Ok(gray)
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    cmyk.chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u16::from(px[3]);
            [0, 1, 2].map(|i| ((255 - u16::from(px[i])) * k / 255) as u8)
        })
        .collect()
}

/// Runs an external OCR command per page image
///
/// The image is written to a temporary file whose path replaces `{image}` in
/// the argument list; recognized text is read from stdout. Confidence is the
/// share of alphanumeric characters among the non-whitespace output, which
/// is low for the symbol soup a bad scan produces.
#[derive(Debug, Clone)]
pub struct CommandOcr {
    command: Vec<String>,
}

impl CommandOcr {
    /// Create an engine for a command line such as `["tesseract", "{image}", "stdout"]`
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// The configured command line
    pub fn command(&self) -> &[String] {
        &self.command
    }
}

impl OcrEngine for CommandOcr {
    fn recognize(&self, page_image: &[u8]) -> Result<OcrOutput, String> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| "OCR command is empty".to_string())?;

        let mut image = tempfile::Builder::new()
            .prefix("paperclerk-page-")
            .tempfile()
            .map_err(|e| format!("Cannot create page image file: {}", e))?;
        image
            .write_all(page_image)
            .and_then(|_| image.flush())
            .map_err(|e| format!("Cannot write page image file: {}", e))?;

        let image_path = image.path().to_string_lossy().into_owned();
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.replace(IMAGE_PLACEHOLDER, &image_path))
            .collect();

        let output = duct::cmd(program.as_str(), args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|e| format!("Cannot run {}: {}", program, e))?;

        if !output.status.success() {
            return Err(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let confidence = text_quality(&text);
        Ok(OcrOutput { text, confidence })
    }
}

/// Share of alphanumeric characters among the non-whitespace characters
pub fn text_quality(text: &str) -> Confidence {
    let (visible, alnum) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(visible, alnum), c| {
            (visible + 1, alnum + usize::from(c.is_alphanumeric()))
        });
    if visible == 0 {
        return Confidence::ZERO;
    }
    Confidence::clamped(alnum as f64 / visible as f64)
}

/// OCR engine that recognizes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn recognize(&self, _page_image: &[u8]) -> Result<OcrOutput, String> {
        Ok(OcrOutput {
            text: String::new(),
            confidence: Confidence::ZERO,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{pdf_with_image, pdf_with_pages};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use image::GenericImageView;
    use lopdf::dictionary;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_text_quality() {
        assert_eq!(text_quality(""), Confidence::ZERO);
        assert_eq!(text_quality("   \n"), Confidence::ZERO);
        assert_eq!(text_quality("Rechnung 2024"), Confidence::FULL);
        assert!(text_quality("~~|| #a").value() < 0.5);
    }

    #[test]
    fn test_disabled_ocr() {
        let output = DisabledOcr.recognize(b"image").unwrap();
        assert!(output.text.is_empty());
        assert_eq!(output.confidence, Confidence::ZERO);
    }

    #[test]
    fn test_command_ocr_empty_command() {
        let engine = CommandOcr::new(Vec::new());
        assert!(engine.recognize(b"image").is_err());
    }

    #[test]
    fn test_command_ocr_missing_program() {
        let engine = CommandOcr::new(vec![
            "paperclerk-no-such-ocr-binary".to_string(),
            IMAGE_PLACEHOLDER.to_string(),
        ]);
        assert!(engine.recognize(b"image").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_ocr_reads_stdout() {
        // `cat` echoes the "image" back as recognized text
        let engine = CommandOcr::new(vec!["cat".to_string(), IMAGE_PLACEHOLDER.to_string()]);
        let output = engine.recognize(b"Kontoauszug Mai").unwrap();
        assert_eq!(output.text, "Kontoauszug Mai");
        assert_eq!(output.confidence, Confidence::FULL);
    }

    #[test]
    fn test_embedded_image_absent_on_text_page() {
        let pdf = pdf_with_pages(&[Some("text only")]);
        assert_eq!(EmbeddedImageSource.page_image(&pdf, 0).unwrap(), None);
        assert!(EmbeddedImageSource.page_image(&pdf, 5).is_err());
    }

    #[test]
    fn test_flate_gray_scan_becomes_png() {
        let pixels: Vec<u8> = (0..12).map(|i| i * 20).collect();
        let pdf = pdf_with_image(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 3,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&pixels),
        );

        let png = EmbeddedImageSource.page_image(&pdf, 0).unwrap().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.to_luma8().into_raw(), pixels);
    }

    #[test]
    fn test_flate_wrapped_jpeg_is_inflated() {
        let jpeg = b"\xFF\xD8\xFF\xE0 fake jpeg body \xFF\xD9".to_vec();
        let pdf = pdf_with_image(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 10,
                "Height" => 10,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => vec![Object::Name(b"FlateDecode".to_vec()), Object::Name(b"DCTDecode".to_vec())],
            },
            deflate(&jpeg),
        );

        assert_eq!(EmbeddedImageSource.page_image(&pdf, 0).unwrap(), Some(jpeg));
    }

    #[test]
    fn test_bilevel_scan_expands_to_gray() {
        // 10 pixels per row, two bytes per row: black pixel first, rest white
        let rows = [0b0111_1111u8, 0b1100_0000, 0b1111_1111, 0b1100_0000];
        let pdf = pdf_with_image(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 10,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 1,
                "Filter" => "FlateDecode",
            },
            deflate(&rows),
        );

        let png = EmbeddedImageSource.page_image(&pdf, 0).unwrap().unwrap();
        let gray = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(gray.dimensions(), (10, 2));
        assert_eq!(gray.get_pixel(0, 0).0, [0]);
        assert_eq!(gray.get_pixel(1, 0).0, [255]);
        assert_eq!(gray.get_pixel(0, 1).0, [255]);
    }

    #[test]
    fn test_unsupported_filter_is_skipped() {
        let pdf = pdf_with_image(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 8,
                "BitsPerComponent" => 1,
                "Filter" => "CCITTFaxDecode",
            },
            vec![0u8; 8],
        );
        assert_eq!(EmbeddedImageSource.page_image(&pdf, 0).unwrap(), None);
    }

    #[test]
    fn test_png_up_predictor() {
        let parms = dictionary! { "Predictor" => 12, "Columns" => 3 };
        // Row filter 0 (none), then row filter 2 (up) adding to the previous row
        let encoded = vec![0, 10, 20, 30, 2, 1, 1, 1];
        assert_eq!(undo_predictor(encoded, &parms).unwrap(), vec![10, 20, 30, 11, 21, 31]);
    }
}
