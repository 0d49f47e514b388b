//! Document construction: place images on fixed-size pages and export a PDF.
//!
//! A new document starts with one blank page; [`DocumentSink::add_page`]
//! appends another and makes it current. Images are embedded as JPEG
//! (`/DCTDecode`) XObjects drawn through a `cm` transform, so the PDF
//! viewer does the scaling and the pixel data is stored once.

use crate::config::PageSize;
use crate::error::ConvertError;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where an image lands on its page, in points, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Placement {
    /// Scale `(img_width, img_height)` uniformly to fit `page` and centre it.
    pub fn fit(img_width: u32, img_height: u32, page: PageSize) -> Self {
        let (iw, ih) = (img_width.max(1) as f32, img_height.max(1) as f32);
        let ratio = (page.width / iw).min(page.height / ih);
        let width = iw * ratio;
        let height = ih * ratio;
        Self {
            x: (page.width - width) / 2.0,
            y: (page.height - height) / 2.0,
            width,
            height,
        }
    }
}

/// Creates empty documents.
pub trait DocumentAssembler: Send + Sync {
    fn new_document(&self) -> Box<dyn DocumentSink>;
}

/// A document under construction.
pub trait DocumentSink {
    fn page_size(&self) -> PageSize;

    /// Append a blank page and make it current.
    fn add_page(&mut self) -> Result<(), ConvertError>;

    /// Draw `image` on the current page.
    fn place_image(&mut self, image: &DynamicImage, at: Placement) -> Result<(), ConvertError>;

    fn export(self: Box<Self>) -> Result<Vec<u8>, ConvertError>;
}

/// lopdf-backed PDF assembler.
#[derive(Debug, Clone)]
pub struct PdfAssembler {
    pub page_size: PageSize,
    pub jpeg_quality: u8,
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            jpeg_quality: crate::config::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl DocumentAssembler for PdfAssembler {
    fn new_document(&self) -> Box<dyn DocumentSink> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Box::new(PdfSink {
            doc,
            pages_id,
            page_size: self.page_size,
            jpeg_quality: self.jpeg_quality,
            finished: Vec::new(),
            current: PageDraft::default(),
        })
    }
}

#[derive(Default)]
struct PageDraft {
    images: Vec<(String, ObjectId)>,
    operations: Vec<Operation>,
}

struct PdfSink {
    doc: Document,
    pages_id: ObjectId,
    page_size: PageSize,
    jpeg_quality: u8,
    finished: Vec<ObjectId>,
    current: PageDraft,
}

impl PdfSink {
    fn internal(e: lopdf::Error) -> ConvertError {
        ConvertError::Internal(format!("PDF assembly failed: {e}"))
    }

    /// Write the current draft out as a page object.
    fn flush_page(&mut self) -> Result<(), ConvertError> {
        let draft = std::mem::take(&mut self.current);

        let mut xobjects = lopdf::Dictionary::new();
        for (name, id) in &draft.images {
            xobjects.set(name.as_bytes().to_vec(), *id);
        }

        let content = Content {
            operations: draft.operations,
        };
        let encoded = content.encode().map_err(Self::internal)?;
        let content_id = self
            .doc
            .add_object(Stream::new(lopdf::Dictionary::new(), encoded));

        let media_box: Vec<Object> = vec![
            Object::Integer(0),
            Object::Integer(0),
            self.page_size.width.into(),
            self.page_size.height.into(),
        ];
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => media_box,
            "Resources" => dictionary! { "XObject" => xobjects },
            "Contents" => content_id,
        });
        self.finished.push(page_id);
        Ok(())
    }

    fn image_stream(&self, image: &DynamicImage) -> Result<Stream, ConvertError> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(rgb)
            .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality))
            .map_err(|e| ConvertError::from_encode("jpeg", e))?;

        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        };
        // Already compressed; keep lopdf from deflating it again.
        Ok(Stream::new(dict, jpeg).with_compression(false))
    }
}

impl DocumentSink for PdfSink {
    fn page_size(&self) -> PageSize {
        self.page_size
    }

    fn add_page(&mut self) -> Result<(), ConvertError> {
        self.flush_page()
    }

    fn place_image(&mut self, image: &DynamicImage, at: Placement) -> Result<(), ConvertError> {
        let stream = self.image_stream(image)?;
        let image_id = self.doc.add_object(stream);
        let name = format!("Im{}", self.current.images.len() + 1);

        self.current.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    at.width.into(),
                    Object::Integer(0),
                    Object::Integer(0),
                    at.height.into(),
                    at.x.into(),
                    at.y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        self.current.images.push((name, image_id));
        Ok(())
    }

    fn export(mut self: Box<Self>) -> Result<Vec<u8>, ConvertError> {
        self.flush_page()?;

        let kids: Vec<Object> = self.finished.iter().map(|id| (*id).into()).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| ConvertError::Internal(format!("PDF export failed: {e}")))?;
        debug!("Exported PDF: {} pages, {} bytes", count, buf.len());
        Ok(buf)
    }
}
