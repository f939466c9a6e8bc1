//! Re-assembling edited pages into one output document.
//!
//! Assembly only reads page images; it knows nothing about edits or backups.

use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use tracing::{debug, info};

use crate::error::{AssembleError, PageditError, Result};
use crate::storage::PageStorage;

/// Output document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One PDF page per page image.
    Pdf,
    /// A single raster file; only valid for one-page documents.
    Image(ImageFormat),
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Image(format) => format.extensions_str().first().copied().unwrap_or("png"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = PageditError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        if name == "pdf" {
            return Ok(OutputFormat::Pdf);
        }
        ImageFormat::from_extension(&name)
            .filter(|f| f.writing_enabled())
            .map(OutputFormat::Image)
            .ok_or_else(|| PageditError::Config(format!("unsupported output format '{}'", s)))
    }
}

/// Write `pages` to `output` as a single document.
pub fn assemble(pages: &[RgbImage], format: OutputFormat, dpi: u32, output: &Path) -> Result<()> {
    if pages.is_empty() {
        return Err(AssembleError::Empty.into());
    }

    match format {
        OutputFormat::Pdf => std::fs::write(output, pdf_bytes(pages, dpi)?)?,
        OutputFormat::Image(image_format) => {
            if pages.len() > 1 {
                return Err(AssembleError::MultiPageImage(pages.len()).into());
            }
            pages[0].save_with_format(output, image_format)?;
        }
    }

    info!("Wrote {} page(s) to {}", pages.len(), output.display());
    Ok(())
}

/// Assemble every page of a session, in page order.
pub fn assemble_session(
    storage: &dyn PageStorage,
    session: &str,
    format: OutputFormat,
    dpi: u32,
    output: &Path,
) -> Result<usize> {
    let pages = storage
        .pages(session)?
        .iter()
        .map(|page| storage.load_page(page))
        .collect::<Result<Vec<_>>>()?;
    assemble(&pages, format, dpi, output)?;
    Ok(pages.len())
}

/// Page size in PDF points for a raster at `dpi`.
pub fn page_size_points(image: &RgbImage, dpi: u32) -> (f32, f32) {
    let dpi = dpi.max(1) as f32;
    (image.width() as f32 * 72.0 / dpi, image.height() as f32 * 72.0 / dpi)
}

/// Serialise pages as a PDF with one full-page image each.
pub fn pdf_bytes(pages: &[RgbImage], dpi: u32) -> std::result::Result<Vec<u8>, AssembleError> {
    if pages.is_empty() {
        return Err(AssembleError::Empty);
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());

    for image in pages {
        let (width, height) = page_size_points(image, dpi);

        let pixels = deflate(image.as_raw())?;
        let xobject = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width()),
                "Height" => i64::from(image.height()),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            pixels,
        );
        let image_id = doc.add_object(xobject);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![width.into(), 0.into(), 0.into(), height.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content.encode().map_err(|e| AssembleError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
        debug!("Added {}x{} page ({:.1}x{:.1}pt)", image.width(), image.height(), width, height);
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(|e| AssembleError::Pdf(e.to_string()))?;
    Ok(buffer)
}

fn deflate(data: &[u8]) -> std::result::Result<Vec<u8>, AssembleError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|e| AssembleError::Pdf(e.to_string()))?;
    encoder.finish().map_err(|e| AssembleError::Pdf(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::PdfRasters;
    use crate::storage::{MemoryStorage, PageId};
    use image::Rgb;
    use pretty_assertions::assert_eq;

    fn page(seed: u8) -> RgbImage {
        RgbImage::from_fn(50, 20, |x, y| Rgb([x as u8, y as u8, seed]))
    }

    #[test]
    fn test_output_format() {
        assert_eq!("pdf".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Image(ImageFormat::Png));
        assert_eq!("jpg".parse::<OutputFormat>().unwrap().extension(), "jpg");
        assert_eq!("docx".parse::<OutputFormat>().unwrap_err().kind(), "config");
    }

    #[test]
    fn test_page_size_points() {
        let image = RgbImage::new(1700, 2200);
        assert_eq!(page_size_points(&image, 200), (612.0, 792.0));
    }

    #[test]
    fn test_pdf_pages_carry_the_images() {
        let pages = vec![page(1), page(2), page(3)];
        let bytes = pdf_bytes(&pages, 200).unwrap();

        let rasters = PdfRasters::load(&bytes).unwrap();
        assert_eq!(rasters.page_count(), 3);
        assert_eq!(rasters.pages().unwrap(), pages);

        let doc = Document::load_mem(&bytes).unwrap();
        let first = doc.get_pages()[&1];
        let media_box = doc.get_dictionary(first).unwrap().get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_float().unwrap(), 18.0);
        assert_eq!(media_box[3].as_float().unwrap(), 7.2);
    }

    #[test]
    fn test_empty_and_multi_page_image() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.png");
        let err = assemble(&[], OutputFormat::Pdf, 200, &out).unwrap_err();
        assert_eq!(err.kind(), "assemble");

        let err = assemble(&[page(0), page(1)], OutputFormat::Image(ImageFormat::Png), 200, &out).unwrap_err();
        assert!(matches!(err, PageditError::Assemble(AssembleError::MultiPageImage(2))));
        assert!(!out.exists());

        assemble(&[page(9)], OutputFormat::Image(ImageFormat::Png), 200, &out).unwrap();
        assert_eq!(image::open(&out).unwrap().to_rgb8(), page(9));
    }

    #[test]
    fn test_assemble_session_orders_pages() {
        let storage = MemoryStorage::new();
        for i in [2u32, 0, 1] {
            storage.insert_page(PageId::new("s", i), page(i as u8));
        }
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("doc.pdf");

        assert_eq!(assemble_session(&storage, "s", OutputFormat::Pdf, 72, &out).unwrap(), 3);
        let rasters = PdfRasters::load(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(rasters.pages().unwrap(), vec![page(0), page(1), page(2)]);
    }
}
