//! # PDF Rewriter Module
//!
//! Questo modulo gestisce il grafo degli oggetti di un PDF e la sostituzione
//! delle immagini raster ricompresse.
//!
//! ## Responsabilità:
//! - Caricamento del documento con `lopdf` (rifiuta PDF cifrati)
//! - Enumerazione delle immagini raster di tutte le pagine, una sola volta per oggetto
//! - Calcolo del DPI di posizionamento dai content stream (`q`/`Q`/`cm`/`Do`, Form XObject)
//! - Invocazione dell'`ImageOptimizer` per ogni immagine idonea
//! - Sostituzione in place degli stream immagine più piccoli
//! - Statistiche cumulative sui byte delle immagini
//!
//! ## Regole:
//! - Immagini condivise tra pagine: ottimizzate una volta, riferimento riusato
//! - Immagini con contenuto identico in oggetti distinti: cache SHA-256
//! - Errori su una singola immagine: l'immagine resta invariata, il documento prosegue
//! - Nessuna immagine idonea: il documento non viene ri-serializzato
//! - Testo, font, vettoriale, annotazioni e metadati passano invariati

use crate::error::CompressError;
use crate::image_optimizer::{
    ColorModel, EmbeddedImage, ImageOptimizer, Optimization, OutputEncoding, ReencodedImage,
    StreamEncoding,
};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Nesting limit for Form XObjects and the page tree
const MAX_NESTING: usize = 32;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// An in-memory parsed PDF, exclusive to one job
pub struct PdfDocument {
    inner: Document,
}

impl PdfDocument {
    /// Parses a PDF from memory.
    ///
    /// # Errors
    /// `CompressError::Parse` for malformed or encrypted documents.
    pub fn load_mem(bytes: &[u8]) -> Result<Self, CompressError> {
        let inner = Document::load_mem(bytes)?;
        if inner.trailer.get(b"Encrypt").is_ok() {
            return Err(CompressError::Parse(
                "encrypted PDFs are not supported".to_string(),
            ));
        }
        Ok(Self { inner })
    }

    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Every raster image reachable from a page, once per object, in page order.
    ///
    /// `declared_dpi` is the lowest effective DPI across all placements of the
    /// image; `None` if it is never drawn or a content stream using it could
    /// not be decoded.
    pub fn embedded_images(&self) -> Vec<(ObjectId, EmbeddedImage)> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut scanner = PlacementScanner::new(&self.inner);

        for (_, page_id) in self.inner.get_pages() {
            let resources = page_resources(&self.inner, page_id);
            if let Some(resources) = resources {
                collect_images(&self.inner, resources, &mut order, &mut seen, 0);
            }
            match self.inner.get_page_content(page_id) {
                Ok(content) => scanner.scan(&content, resources, IDENTITY, &mut Vec::new()),
                Err(e) => {
                    debug!("Page {:?} content not readable: {}", page_id, e);
                    if let Some(resources) = resources {
                        scanner.mark_unknown(resources, 0);
                    }
                }
            }
        }

        order
            .into_iter()
            .filter_map(|id| {
                let stream = self.inner.get_object(id).ok()?.as_stream().ok()?;
                let dpi = scanner.declared_dpi(id);
                Some((id, describe_image(&self.inner, stream, dpi)))
            })
            .collect()
    }

    /// Swaps the stream of image `id` for its re-encoded counterpart.
    ///
    /// Only the pixel-format keys change; `/ColorSpace`, `/SMask`, `/Decode`
    /// and everything else in the dictionary are kept.
    pub fn replace_image(
        &mut self,
        id: ObjectId,
        image: ReencodedImage,
    ) -> Result<(), CompressError> {
        let stream = self.inner.get_object_mut(id)?.as_stream_mut()?;

        let filter: &[u8] = match image.encoding {
            OutputEncoding::Dct => b"DCTDecode",
            OutputEncoding::Flate => b"FlateDecode",
        };
        stream.dict.set("Width", Object::Integer(image.width as i64));
        stream.dict.set("Height", Object::Integer(image.height as i64));
        stream.dict.set("Filter", Object::Name(filter.to_vec()));
        stream.dict.remove(b"DecodeParms");
        stream.set_content(image.data);
        Ok(())
    }

    pub fn save_to_vec(&mut self) -> Result<Vec<u8>, CompressError> {
        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| CompressError::Parse(format!("failed to serialize document: {}", e)))?;
        Ok(buffer)
    }
}

/// Byte statistics over the images eligible for optimization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub images_found: usize,
    pub eligible: usize,
    pub replaced: usize,
    pub failed: usize,
    /// Images whose result came from the content-hash cache
    pub deduplicated: usize,
    pub original_image_bytes: u64,
    pub new_image_bytes: u64,
}

/// Candidate output of a rewrite
#[derive(Debug)]
pub struct RewrittenDocument {
    /// Serialized document; `None` when no image was eligible and nothing was re-saved
    pub bytes: Option<Vec<u8>>,
    pub stats: RewriteStats,
}

/// Drives the `ImageOptimizer` over every image of a document
pub struct PdfRewriter {
    optimizer: ImageOptimizer,
    small_image_threshold: usize,
}

impl PdfRewriter {
    pub fn new(optimizer: ImageOptimizer, small_image_threshold: usize) -> Self {
        Self {
            optimizer,
            small_image_threshold,
        }
    }

    /// Re-encodes the document's images and serializes the result.
    ///
    /// Images at or below `small_image_threshold` stored bytes are not
    /// eligible. The returned sizes are image totals only; the caller compares
    /// whole-file sizes before committing anything.
    pub fn rewrite(&self, document: &mut PdfDocument) -> Result<RewrittenDocument, CompressError> {
        let images = document.embedded_images();
        let mut stats = RewriteStats {
            images_found: images.len(),
            ..RewriteStats::default()
        };
        let mut cache: HashMap<CacheKey, Option<Optimization>> = HashMap::new();
        let mut replacements = Vec::new();

        for (id, image) in images {
            let original_len = image.data.len() as u64;
            if image.data.len() <= self.small_image_threshold {
                debug!("Image {:?} below threshold ({} bytes)", id, original_len);
                continue;
            }
            stats.eligible += 1;
            stats.original_image_bytes += original_len;

            let key = cache_key(&image, self.optimizer.target_dimensions_for(&image));
            let result = match cache.get(&key) {
                Some(cached) => {
                    stats.deduplicated += 1;
                    cached.clone()
                }
                None => {
                    let result = match self.optimizer.optimize(&image) {
                        Ok(optimization) => Some(optimization),
                        Err(e) => {
                            warn!("Image {:?} left unchanged: {}", id, e);
                            None
                        }
                    };
                    cache.insert(key, result.clone());
                    result
                }
            };

            match result {
                Some(Optimization::Reencoded(reencoded)) => {
                    stats.replaced += 1;
                    stats.new_image_bytes += reencoded.data.len() as u64;
                    replacements.push((id, reencoded));
                }
                Some(Optimization::Unchanged(reason)) => {
                    debug!("Image {:?} unchanged: {:?}", id, reason);
                    stats.new_image_bytes += original_len;
                }
                None => {
                    stats.failed += 1;
                    stats.new_image_bytes += original_len;
                }
            }
        }

        if stats.eligible == 0 {
            debug!("No eligible images, document not re-saved");
            return Ok(RewrittenDocument { bytes: None, stats });
        }

        for (id, reencoded) in replacements {
            document.replace_image(id, reencoded)?;
        }

        let bytes = document.save_to_vec()?;
        debug!(
            "Rewrite: {}/{} images replaced, image bytes {} -> {}",
            stats.replaced, stats.eligible, stats.original_image_bytes, stats.new_image_bytes
        );
        Ok(RewrittenDocument {
            bytes: Some(bytes),
            stats,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    digest: [u8; 32],
    target: (u32, u32),
}

fn cache_key(image: &EmbeddedImage, target: (u32, u32)) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{}x{}:{:?}:{}:{:?}:{}:{}",
            image.width,
            image.height,
            image.color,
            image.bits_per_component,
            image.encoding,
            image.has_soft_mask,
            image.has_color_key_mask
        )
        .as_bytes(),
    );
    hasher.update(&image.data);
    CacheKey {
        digest: hasher.finalize().into(),
        target,
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn name_of<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a [u8]> {
    resolve(doc, object)?.as_name().ok()
}

/// Resources of a page, inherited through `/Parent` when absent
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_NESTING {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(doc, resources)?.as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn xobjects<'a>(doc: &'a Document, resources: &'a Dictionary) -> Option<&'a Dictionary> {
    resolve(doc, resources.get(b"XObject").ok()?)?.as_dict().ok()
}

fn subtype(stream: &Stream) -> Option<&[u8]> {
    stream.dict.get(b"Subtype").ok()?.as_name().ok()
}

fn stream_content(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Some(stream.content.clone());
    }
    stream.decompressed_content().ok()
}

fn collect_images(
    doc: &Document,
    resources: &Dictionary,
    order: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
    depth: usize,
) {
    if depth > MAX_NESTING {
        return;
    }
    let Some(xobjects) = xobjects(doc, resources) else {
        return;
    };

    for (_, value) in xobjects.iter() {
        let Ok(id) = value.as_reference() else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) else {
            continue;
        };
        match subtype(stream) {
            Some(b"Image") => order.push(id),
            Some(b"Form") => {
                if let Some(form_resources) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve(doc, r))
                    .and_then(|r| r.as_dict().ok())
                {
                    collect_images(doc, form_resources, order, seen, depth + 1);
                }
            }
            _ => {}
        }
    }
}

fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn matrix_from(operands: &[Object]) -> Option<Matrix> {
    if operands.len() != 6 {
        return None;
    }
    let mut matrix = IDENTITY;
    for (slot, operand) in matrix.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(matrix)
}

/// Walks content streams and records the effective DPI of every image placement
struct PlacementScanner<'a> {
    doc: &'a Document,
    dpi: HashMap<ObjectId, f32>,
    unknown: HashSet<ObjectId>,
}

impl<'a> PlacementScanner<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            dpi: HashMap::new(),
            unknown: HashSet::new(),
        }
    }

    fn declared_dpi(&self, id: ObjectId) -> Option<f32> {
        if self.unknown.contains(&id) {
            return None;
        }
        self.dpi.get(&id).copied()
    }

    /// Images under `resources` whose placements cannot be measured
    fn mark_unknown(&mut self, resources: &Dictionary, depth: usize) {
        let mut order = Vec::new();
        collect_images(self.doc, resources, &mut order, &mut HashSet::new(), depth);
        self.unknown.extend(order);
    }

    fn scan(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        base: Matrix,
        forms: &mut Vec<ObjectId>,
    ) {
        let operations = match Content::decode(content) {
            Ok(content) => content.operations,
            Err(e) => {
                debug!("Content stream not decodable: {}", e);
                if let Some(resources) = resources {
                    self.mark_unknown(resources, forms.len());
                }
                return;
            }
        };

        let mut ctm = base;
        let mut stack: Vec<Matrix> = Vec::new();
        for operation in &operations {
            match operation.operator.as_str() {
                "q" => stack.push(ctm),
                "Q" => ctm = stack.pop().unwrap_or(base),
                "cm" => {
                    if let Some(m) = matrix_from(&operation.operands) {
                        ctm = multiply(&m, &ctm);
                    }
                }
                "Do" => {
                    let name = operation.operands.first().and_then(|o| o.as_name().ok());
                    if let (Some(name), Some(resources)) = (name, resources) {
                        self.place(name, resources, ctm, forms);
                    }
                }
                _ => {}
            }
        }
    }

    fn place(
        &mut self,
        name: &[u8],
        resources: &'a Dictionary,
        ctm: Matrix,
        forms: &mut Vec<ObjectId>,
    ) {
        let doc = self.doc;
        let Some(id) = xobjects(doc, resources)
            .and_then(|x| x.get(name).ok())
            .and_then(|o| o.as_reference().ok())
        else {
            return;
        };
        let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) else {
            return;
        };

        match subtype(stream) {
            Some(b"Image") => self.record(id, stream, &ctm),
            Some(b"Form") => {
                if forms.contains(&id) || forms.len() >= MAX_NESTING {
                    return;
                }
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| resolve(doc, m))
                    .and_then(|m| m.as_array().ok())
                    .and_then(|m| matrix_from(m))
                    .unwrap_or(IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve(doc, r))
                    .and_then(|r| r.as_dict().ok())
                    .unwrap_or(resources);

                match stream_content(stream) {
                    Some(content) => {
                        forms.push(id);
                        self.scan(&content, Some(form_resources), multiply(&matrix, &ctm), forms);
                        forms.pop();
                    }
                    None => self.mark_unknown(form_resources, forms.len() + 1),
                }
            }
            _ => {}
        }
    }

    fn record(&mut self, id: ObjectId, stream: &Stream, ctm: &Matrix) {
        let doc = self.doc;
        let pixels = |key: &[u8]| {
            stream
                .dict
                .get(key)
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(number)
                .filter(|v| *v > 0.0)
        };
        let (Some(width_px), Some(height_px)) = (pixels(b"Width"), pixels(b"Height")) else {
            return;
        };

        let width_pt = (ctm[0] * ctm[0] + ctm[1] * ctm[1]).sqrt();
        let height_pt = (ctm[2] * ctm[2] + ctm[3] * ctm[3]).sqrt();
        if width_pt <= f32::EPSILON || height_pt <= f32::EPSILON {
            return;
        }

        let dpi = (width_px * 72.0 / width_pt).max(height_px * 72.0 / height_pt);
        let entry = self.dpi.entry(id).or_insert(dpi);
        *entry = entry.min(dpi);
    }
}

fn describe_image(doc: &Document, stream: &Stream, declared_dpi: Option<f32>) -> EmbeddedImage {
    let dict = &stream.dict;
    let integer = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_i64().ok())
    };
    let dimension = |key: &[u8]| integer(key).and_then(|v| u32::try_from(v).ok()).unwrap_or(0);

    let image_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let (color, bits_per_component) = if image_mask {
        (ColorModel::Gray, 1)
    } else {
        let bpc = integer(b"BitsPerComponent")
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(8);
        let color = dict
            .get(b"ColorSpace")
            .ok()
            .map(|cs| color_model(doc, cs))
            .unwrap_or_else(|| ColorModel::Other("none".to_string()));
        (color, bpc)
    };

    EmbeddedImage {
        data: stream.content.clone(),
        encoding: stream_encoding(doc, dict),
        width: dimension(b"Width"),
        height: dimension(b"Height"),
        color,
        bits_per_component,
        declared_dpi,
        has_soft_mask: dict.get(b"SMask").is_ok(),
        has_color_key_mask: matches!(
            dict.get(b"Mask").ok().and_then(|m| resolve(doc, m)),
            Some(Object::Array(_))
        ),
    }
}

fn color_model(doc: &Document, color_space: &Object) -> ColorModel {
    let Some(resolved) = resolve(doc, color_space) else {
        return ColorModel::Other("unresolved".to_string());
    };

    let (family, params): (&[u8], &[Object]) = match resolved {
        Object::Name(name) => (name.as_slice(), &[][..]),
        Object::Array(items) => match items.first().and_then(|o| name_of(doc, o)) {
            Some(name) => (name, &items[1..]),
            None => return ColorModel::Other("array".to_string()),
        },
        _ => return ColorModel::Other("invalid".to_string()),
    };

    match family {
        b"DeviceGray" | b"CalGray" | b"G" => ColorModel::Gray,
        b"DeviceRGB" | b"CalRGB" | b"RGB" => ColorModel::Rgb,
        b"DeviceCMYK" | b"CMYK" => ColorModel::Cmyk,
        b"Indexed" | b"I" => ColorModel::Indexed,
        b"Lab" => ColorModel::Lab,
        b"Separation" => ColorModel::DeviceN(1),
        b"DeviceN" => match params
            .first()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
        {
            Some(colorants) if !colorants.is_empty() => ColorModel::DeviceN(colorants.len()),
            _ => ColorModel::Other("DeviceN".to_string()),
        },
        b"ICCBased" => {
            let components = params
                .first()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_stream().ok())
                .and_then(|s| s.dict.get(b"N").ok())
                .and_then(|n| resolve(doc, n))
                .and_then(|n| n.as_i64().ok());
            match components {
                Some(1) => ColorModel::Gray,
                Some(3) => ColorModel::Rgb,
                Some(4) => ColorModel::Cmyk,
                _ => ColorModel::Other("ICCBased".to_string()),
            }
        }
        other => ColorModel::Other(String::from_utf8_lossy(other).into_owned()),
    }
}

fn stream_encoding(doc: &Document, dict: &Dictionary) -> StreamEncoding {
    let Ok(filter) = dict.get(b"Filter") else {
        return StreamEncoding::Uncompressed;
    };

    let name = match resolve(doc, filter) {
        Some(Object::Name(name)) => name.as_slice(),
        Some(Object::Array(items)) if items.is_empty() => return StreamEncoding::Uncompressed,
        Some(Object::Array(items)) if items.len() == 1 => match name_of(doc, &items[0]) {
            Some(name) => name,
            None => return StreamEncoding::Unsupported("invalid filter".to_string()),
        },
        Some(Object::Array(_)) => return StreamEncoding::Unsupported("filter chain".to_string()),
        _ => return StreamEncoding::Unsupported("invalid filter".to_string()),
    };

    match name {
        b"DCTDecode" | b"DCT" => StreamEncoding::Dct,
        b"FlateDecode" | b"Fl" => {
            if has_predictor(doc, dict) {
                StreamEncoding::Unsupported("FlateDecode with predictor".to_string())
            } else {
                StreamEncoding::Flate
            }
        }
        other => StreamEncoding::Unsupported(String::from_utf8_lossy(other).into_owned()),
    }
}

fn has_predictor(doc: &Document, dict: &Dictionary) -> bool {
    let params = match dict.get(b"DecodeParms").ok().and_then(|p| resolve(doc, p)) {
        Some(Object::Dictionary(params)) => Some(params),
        Some(Object::Array(items)) => items
            .first()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok()),
        _ => None,
    };
    params
        .and_then(|p| p.get(b"Predictor").ok())
        .and_then(|p| p.as_i64().ok())
        .is_some_and(|predictor| predictor > 1)
}
