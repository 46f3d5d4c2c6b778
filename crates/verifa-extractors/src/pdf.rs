//! PDF text layer (pdf-extract) and page images (lopdf).
//!
//! Both libraries are synchronous, so every call runs in `spawn_blocking`.
//! Scanned PDFs carry one image XObject per page; "rasterizing" such a page
//! means pulling that image back out, so no renderer is needed.

use async_trait::async_trait;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{ExtractError, ExtractResult};
use crate::types::PageImage;
use crate::DocumentReader;

/// Reads PDFs without rendering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfReader;

impl PdfReader {
    pub fn new() -> Self {
        Self
    }

    /// Number of pages in the document.
    pub fn page_count(content: &[u8]) -> ExtractResult<usize> {
        let doc = load(content)?;
        Ok(doc.get_pages().len())
    }
}

fn load(content: &[u8]) -> ExtractResult<Document> {
    Document::load_mem(content).map_err(|e| ExtractError::Pdf(format!("Failed to load PDF: {}", e)))
}

#[async_trait]
impl DocumentReader for PdfReader {
    async fn text_layer(&self, content: &[u8]) -> ExtractResult<Vec<String>> {
        let content = content.to_vec();
        tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&content)
                .map_err(|e| ExtractError::Pdf(e.to_string()))
        })
        .await?
    }

    async fn page_images(&self, content: &[u8]) -> ExtractResult<Vec<PageImage>> {
        let content = content.to_vec();
        tokio::task::spawn_blocking(move || {
            let doc = load(&content)?;
            let mut pages = Vec::new();
            for (number, page_id) in doc.get_pages() {
                match largest_page_image(&doc, page_id) {
                    Some(image) => pages.push(PageImage {
                        page: number as usize,
                        ..image
                    }),
                    None => tracing::debug!(page = number, "no decodable image on page"),
                }
            }
            if pages.is_empty() {
                return Err(ExtractError::Pdf("No page images found".to_string()));
            }
            Ok(pages)
        })
        .await?
    }
}

/// Resources dictionary of a page, following inheritance through `Parent`.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    loop {
        if let Ok(resources) = node.get(b"Resources") {
            return doc.dereference(resources).ok()?.1.as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
}

fn largest_page_image(doc: &Document, page_id: ObjectId) -> Option<PageImage> {
    let resources = page_resources(doc, page_id)?;
    let xobjects = doc.dereference(resources.get(b"XObject").ok()?).ok()?.1.as_dict().ok()?;

    xobjects
        .iter()
        .filter_map(|(_, obj)| doc.dereference(obj).ok()?.1.as_stream().ok())
        .filter(|stream| {
            stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|n| n == b"Image")
                .unwrap_or(false)
        })
        .filter_map(|stream| {
            let width = stream.dict.get(b"Width").and_then(Object::as_i64).ok()?;
            let height = stream.dict.get(b"Height").and_then(Object::as_i64).ok()?;
            let image = decode_image_stream(doc, stream, width, height)?;
            Some((width * height, image))
        })
        .max_by_key(|(area, _)| *area)
        .map(|(_, image)| image)
}

/// Last filter applied to a stream (the one that defines the payload format).
fn last_filter(stream: &lopdf::Stream) -> Option<Vec<u8>> {
    match stream.dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.clone()),
        Object::Array(filters) => filters.last()?.as_name().ok().map(<[u8]>::to_vec),
        _ => None,
    }
}

fn decode_image_stream(
    doc: &Document,
    stream: &lopdf::Stream,
    width: i64,
    height: i64,
) -> Option<PageImage> {
    match last_filter(stream).as_deref() {
        Some(b"DCTDecode") => Some(PageImage::new(0, stream.content.clone(), "image/jpeg")),
        #[cfg(feature = "image")]
        Some(b"FlateDecode") | None => {
            let bits = stream
                .dict
                .get(b"BitsPerComponent")
                .and_then(Object::as_i64)
                .unwrap_or(8);
            if bits != 8 {
                return None;
            }
            let color_space = stream
                .dict
                .get(b"ColorSpace")
                .ok()
                .and_then(|cs| doc.dereference(cs).ok())
                .and_then(|(_, cs)| cs.as_name().ok().map(<[u8]>::to_vec));
            let channels = match color_space.as_deref() {
                Some(b"DeviceGray") => 1,
                Some(b"DeviceRGB") => 3,
                _ => return None,
            };
            let samples = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            let png = crate::image::encode_raw_png(
                u32::try_from(width).ok()?,
                u32::try_from(height).ok()?,
                channels,
                samples,
            )
            .ok()?;
            Some(PageImage::new(0, png, "image/png"))
        }
        _ => {
            let _ = (doc, width, height);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    /// Minimal single-page PDF whose only content is a JPEG image XObject.
    fn scanned_pdf(jpeg: &[u8]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg.to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn test_page_images_pull_embedded_jpeg() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
        let pdf = scanned_pdf(&jpeg);

        assert_eq!(PdfReader::page_count(&pdf).unwrap(), 1);
        let pages = PdfReader::new().page_images(&pdf).await.unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[0].mime_type, "image/jpeg");
        assert_eq!(pages[0].bytes, jpeg);
    }

    #[tokio::test]
    async fn test_garbage_is_a_pdf_error() {
        let err = PdfReader::new().page_images(b"not a pdf").await.unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
