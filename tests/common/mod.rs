//! Shared fixtures for the integration tests: a small lopdf-based PDF
//! builder and deterministic image data.

#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use pdf_space_optimizer::MIN_FILE_SIZE;

/// Placement drawing a 600x400 image at 300 DPI (2 x 1.333 inches)
pub const PLACE_300_DPI: &str = "q 144 0 0 96 0 0 cm /Im1 Do Q";

/// Noisy gradient, large enough as a JPEG to be worth re-encoding
pub fn noisy_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut seed: u32 = 0xC0FF_EE11;
    let pixels = RgbImage::from_fn(width, height, |x, y| {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let noise = (seed >> 24) as u8 / 16;
        image::Rgb([
            ((x * 255 / width) as u8).wrapping_add(noise),
            ((y * 255 / height) as u8).wrapping_add(noise),
            noise.wrapping_mul(5),
        ])
    });

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, 100)
        .encode(pixels.as_raw(), width, height, ColorType::Rgb8)
        .unwrap();
    buffer
}

pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    filler: Option<ObjectId>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            filler: None,
        }
    }

    /// Adds an 8-bit RGB `DCTDecode` image XObject
    pub fn add_jpeg(&mut self, data: Vec<u8>, width: u32, height: u32) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            data,
        ))
    }

    /// Adds a page drawing `image` as `/Im1` with the given content stream
    pub fn add_page(&mut self, image: ObjectId, content: &str) -> ObjectId {
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im1" => image },
            },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        self.page_ids.push(page_id);
        page_id
    }

    /// Pads the document with an uncompressed stream of `size` bytes
    pub fn pad_to(&mut self, size: usize) {
        let filler: Vec<u8> = (0..size).map(|i| b'a' + (i % 26) as u8).collect();
        self.filler = Some(self.doc.add_object(Stream::new(dictionary! {}, filler)));
    }

    pub fn build(mut self) -> Vec<u8> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        };
        if let Some(filler) = self.filler {
            catalog.set("Filler", filler);
        }
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).unwrap();
        bytes
    }
}

/// A PDF just over the size floor with `pages` pages, each drawing its own
/// 600x400 noisy JPEG at 300 DPI
pub fn scanned_pdf(pages: usize) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    for page in 0..pages {
        let height = 400 + page as u32;
        let image = builder.add_jpeg(noisy_jpeg(600, height), 600, height);
        builder.add_page(image, PLACE_300_DPI);
    }
    builder.pad_to(MIN_FILE_SIZE as usize + 512 * 1024);
    builder.build()
}
