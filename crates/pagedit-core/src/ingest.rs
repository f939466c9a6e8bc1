//! Turning uploaded documents into editable page images.
//!
//! Raster files become a single `page_0.png`. PDF pages are rendered at the
//! configured DPI through pdfium into `page_<i>.png`; when pdfium cannot be
//! loaded, each page's largest embedded raster is used instead.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::error::{IngestError, Result};
use crate::storage::{DirStorage, PageId, PageStorage};

/// Kind of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image(ImageFormat),
}

impl DocumentKind {
    /// Classify a file by extension.
    pub fn from_path(path: &Path) -> std::result::Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| IngestError::UnsupportedFormat(path.display().to_string()))?;

        if ext == "pdf" {
            return Ok(DocumentKind::Pdf);
        }
        ImageFormat::from_extension(&ext)
            .filter(|f| f.reading_enabled())
            .map(DocumentKind::Image)
            .ok_or(IngestError::UnsupportedFormat(ext))
    }
}

/// Result of ingesting one document.
#[derive(Debug, Clone, Serialize)]
pub struct Ingested {
    pub session: String,
    /// Copy of the uploaded file inside the session.
    pub source: PathBuf,
    pub pages: Vec<PageId>,
}

/// Create a session for `path` and write its pages into it.
///
/// The document is fully decoded before the session is created, so a file
/// that cannot be read leaves nothing behind.
pub fn ingest_file(storage: &DirStorage, path: &Path, render_dpi: u32) -> Result<Ingested> {
    let kind = DocumentKind::from_path(path)?;
    let data = fs::read(path)?;
    let images = decode_pages(kind, &data, render_dpi)?;

    let session = storage.create_session()?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("bin").to_ascii_lowercase();
    let source = storage.session_dir(&session)?.join(format!("input.{}", ext));
    fs::write(&source, &data)?;

    let mut pages = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let page = PageId::new(session.clone(), index as u32);
        storage.save_page(&page, image)?;
        pages.push(page);
    }

    info!("Ingested {} into session {} ({} pages)", path.display(), session, pages.len());
    Ok(Ingested { session, source, pages })
}

/// Decode a document into RGB page images, in page order.
pub fn decode_pages(kind: DocumentKind, data: &[u8], render_dpi: u32) -> Result<Vec<RgbImage>> {
    match kind {
        DocumentKind::Image(format) => {
            let image = image::load_from_memory_with_format(data, format)?;
            Ok(vec![image.to_rgb8()])
        }
        DocumentKind::Pdf => {
            #[cfg(feature = "native")]
            match pdfium::render_pages(data, render_dpi) {
                Ok(pages) => return Ok(pages),
                Err(e) => tracing::warn!("{}; falling back to embedded page images", e),
            }
            #[cfg(not(feature = "native"))]
            debug!("Rendering unavailable at {} dpi, using embedded page images", render_dpi);

            Ok(PdfRasters::load(data)?.pages()?)
        }
    }
}

#[cfg(feature = "native")]
mod pdfium {
    use image::{DynamicImage, RgbImage, RgbaImage};
    use pdfium_render::prelude::*;
    use tracing::debug;

    use crate::error::IngestError;

    const POINTS_PER_INCH: f32 = 72.0;

    fn bind() -> Result<Pdfium, IngestError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| IngestError::Render(format!("pdfium library not available: {:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }

    /// Render every page at `dpi`.
    pub(super) fn render_pages(data: &[u8], dpi: u32) -> Result<Vec<RgbImage>, IngestError> {
        let pdfium = bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| IngestError::Render(format!("{:?}", e)))?;

        let config = PdfRenderConfig::new().scale_page_by_factor(dpi.max(1) as f32 / POINTS_PER_INCH);
        let mut pages = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| IngestError::Render(format!("page {}: {:?}", index, e)))?;
            let (width, height) = (bitmap.width().max(0) as u32, bitmap.height().max(0) as u32);
            let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
                .ok_or_else(|| IngestError::Render(format!("page {}: short bitmap", index)))?;
            debug!("Rendered page {} at {} dpi: {}x{}", index, dpi, width, height);
            pages.push(DynamicImage::ImageRgba8(rgba).to_rgb8());
        }
        Ok(pages)
    }
}

/// Page rasters embedded in a PDF.
pub struct PdfRasters {
    document: Document,
}

impl PdfRasters {
    pub fn load(data: &[u8]) -> std::result::Result<Self, IngestError> {
        let mut document = Document::load_mem(data).map_err(|e| IngestError::Parse(e.to_string()))?;

        if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(IngestError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        if document.get_pages().is_empty() {
            return Err(IngestError::NoPages);
        }
        Ok(Self { document })
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Every page's raster, in page order.
    pub fn pages(&self) -> std::result::Result<Vec<RgbImage>, IngestError> {
        let pages = self.document.get_pages();
        let mut images = Vec::with_capacity(pages.len());
        for (index, (_, page_id)) in pages.iter().enumerate() {
            images.push(self.page_raster(*page_id, index as u32)?);
        }
        Ok(images)
    }

    /// The largest decodable image drawn on a page.
    fn page_raster(&self, page_id: ObjectId, index: u32) -> std::result::Result<RgbImage, IngestError> {
        let doc = &self.document;
        let mut best: Option<RgbImage> = None;

        if let Some(resources) = page_resources(doc, page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobjects))) = doc.dereference(xobjects) {
                    for (_, reference) in xobjects.iter() {
                        let Ok((_, object)) = doc.dereference(reference) else {
                            continue;
                        };
                        if let Some(image) = decode_image_object(doc, object) {
                            let area = |i: &RgbImage| u64::from(i.width()) * u64::from(i.height());
                            if best.as_ref().is_none_or(|b| area(&image) > area(b)) {
                                best = Some(image);
                            }
                        }
                    }
                }
            }
        }

        let image = best.ok_or(IngestError::NoRaster(index))?;
        debug!("Page {}: {}x{} raster", index, image.width(), image.height());
        Ok(image)
    }
}

/// Resources for a page, following `Parent` links for inherited entries.
fn page_resources(doc: &Document, node_id: ObjectId) -> Option<Dictionary> {
    let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
        return None;
    };
    if let Ok(resources) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(resources))) = doc.dereference(resources) {
            return Some(resources.clone());
        }
    }
    match dict.get(b"Parent") {
        Ok(Object::Reference(parent)) => page_resources(doc, *parent),
        _ => None,
    }
}

/// How image samples map to colour.
#[derive(Debug, Clone, PartialEq)]
enum PixelSpace {
    /// Direct samples with this many components (1 gray, 3 RGB, 4 CMYK).
    Direct(usize),
    /// Unknown space: infer the component count from the data length.
    Guess,
    /// One-byte palette indices into `palette`, whose entries have
    /// `channels` components.
    Indexed { channels: usize, palette: Vec<u8> },
}

fn pixel_space(doc: &Document, object: &Object) -> Option<PixelSpace> {
    let object = doc.dereference(object).ok()?.1;
    match object {
        Object::Name(name) => Some(match name.as_slice() {
            b"DeviceRGB" | b"RGB" | b"CalRGB" => PixelSpace::Direct(3),
            b"DeviceGray" | b"G" | b"CalGray" => PixelSpace::Direct(1),
            b"DeviceCMYK" | b"CMYK" => PixelSpace::Direct(4),
            _ => PixelSpace::Guess,
        }),
        Object::Array(items) => match items.first()?.as_name().ok()? {
            b"Indexed" | b"I" => {
                let channels = match pixel_space(doc, items.get(1)?)? {
                    PixelSpace::Direct(channels) => channels,
                    _ => return None,
                };
                let palette = match doc.dereference(items.get(3)?).ok()?.1 {
                    Object::String(bytes, _) => bytes.clone(),
                    Object::Stream(stream) => stream.decompressed_content().unwrap_or_else(|_| stream.content.clone()),
                    _ => return None,
                };
                Some(PixelSpace::Indexed { channels, palette })
            }
            b"ICCBased" => {
                let stream = doc.dereference(items.get(1)?).ok()?.1.as_stream().ok()?;
                match stream.dict.get(b"N").ok().and_then(|n| n.as_i64().ok()) {
                    Some(n @ (1 | 3 | 4)) => Some(PixelSpace::Direct(n as usize)),
                    _ => Some(PixelSpace::Guess),
                }
            }
            b"CalRGB" | b"Lab" => Some(PixelSpace::Direct(3)),
            b"CalGray" => Some(PixelSpace::Direct(1)),
            _ => Some(PixelSpace::Guess),
        },
        _ => None,
    }
}

/// Filter names of a stream, first-applied-on-decode first.
fn filter_chain(dict: &Dictionary) -> Vec<&[u8]> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.as_slice()],
        Ok(Object::Array(filters)) => filters.iter().filter_map(|f| f.as_name().ok()).collect(),
        _ => Vec::new(),
    }
}

/// Undo general-purpose filters ahead of an image codec.
fn undo_filters(data: &[u8], filters: &[&[u8]]) -> Option<Vec<u8>> {
    let mut data = data.to_vec();
    for filter in filters {
        match *filter {
            b"FlateDecode" | b"Fl" => {
                let mut decoded = Vec::new();
                flate2::read::ZlibDecoder::new(data.as_slice())
                    .read_to_end(&mut decoded)
                    .ok()?;
                data = decoded;
            }
            other => {
                trace!("Unsupported filter before image codec: {}", String::from_utf8_lossy(other));
                return None;
            }
        }
    }
    Some(data)
}

fn decode_image_object(doc: &Document, object: &Object) -> Option<RgbImage> {
    let Object::Stream(stream) = object else {
        return None;
    };
    let dict = &stream.dict;
    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    trace!("Found image object: {}x{}", width, height);

    let filters = filter_chain(dict);
    match filters.split_last() {
        Some((&b"DCTDecode", before)) | Some((&b"DCT", before)) => {
            let jpeg = undo_filters(&stream.content, before)?;
            return image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
                .ok()
                .map(|i| i.to_rgb8());
        }
        Some((&b"JPXDecode", _)) | Some((&b"CCITTFaxDecode", _)) | Some((&b"JBIG2Decode", _)) => {
            trace!("Skipping image with unsupported filter");
            return None;
        }
        _ => {}
    }

    let bits = dict.get(b"BitsPerComponent").ok().and_then(|o| o.as_i64().ok()).unwrap_or(8);
    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());
    let space = match dict.get(b"ColorSpace") {
        Ok(object) => pixel_space(doc, object)?,
        Err(_) => PixelSpace::Direct(3),
    };
    samples_to_rgb(&data, width, height, &space)
}

fn samples_to_rgb(data: &[u8], width: u32, height: u32, space: &PixelSpace) -> Option<RgbImage> {
    let pixels = width as usize * height as usize;
    let channels = match space {
        PixelSpace::Direct(channels) => *channels,
        PixelSpace::Guess => [3, 1, 4].into_iter().find(|c| data.len() == pixels * c)?,
        PixelSpace::Indexed { channels, palette } => {
            if data.len() < pixels {
                return None;
            }
            let expanded = data[..pixels]
                .iter()
                .map(|&i| palette.get(usize::from(i) * channels..(usize::from(i) + 1) * channels))
                .collect::<Option<Vec<_>>>()?
                .concat();
            return samples_to_rgb(&expanded, width, height, &PixelSpace::Direct(*channels));
        }
    };
    if data.len() < pixels * channels {
        trace!("Image data too short: {} < {}", data.len(), pixels * channels);
        return None;
    }

    let rgb: Vec<u8> = match channels {
        3 => data[..pixels * 3].to_vec(),
        1 => data[..pixels].iter().flat_map(|&g| [g, g, g]).collect(),
        4 => data[..pixels * 4]
            .chunks_exact(4)
            .flat_map(|p| {
                let k = 255 - u16::from(p[3]);
                let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
                [channel(p[0]), channel(p[1]), channel(p[2])]
            })
            .collect(),
        _ => return None,
    };
    RgbImage::from_raw(width, height, rgb)
}
