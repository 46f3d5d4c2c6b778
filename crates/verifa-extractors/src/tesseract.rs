//! Local OCR through the tesseract binary.

use async_trait::async_trait;
use rusty_tesseract::{Args, Image};

use verifa_core::types::EngineKind;

use crate::error::{ExtractError, ExtractResult};
use crate::types::Recognition;
use crate::OcrEngine;

const ENGINE: &str = "tesseract";

/// Local/offline OCR engine.
///
/// Fast and good on printed text. May hang on degenerate input, so the
/// orchestrator always runs it under a hard timeout.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    language: String,
    dpi: i32,
}

impl TesseractEngine {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            dpi: 300,
        }
    }

    pub fn with_dpi(mut self, dpi: i32) -> Self {
        self.dpi = dpi;
        self
    }

    fn args(&self) -> Args {
        Args {
            lang: self.language.clone(),
            dpi: Some(self.dpi),
            ..Default::default()
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("ind+eng")
    }
}

/// Rebuild line-broken text and the mean word confidence from tesseract's
/// TSV output. Non-word rows carry a confidence of -1 and are skipped.
fn assemble(rows: &[rusty_tesseract::Data]) -> Recognition {
    let mut text = String::new();
    let mut line = None;
    let mut confidences = Vec::new();

    for row in rows.iter().filter(|r| r.conf >= 0.0 && !r.text.trim().is_empty()) {
        let key = (row.block_num, row.par_num, row.line_num);
        match line {
            Some(current) if current == key => text.push(' '),
            Some(_) => text.push('\n'),
            None => {}
        }
        line = Some(key);
        text.push_str(row.text.trim());
        confidences.push(row.conf / 100.0);
    }

    let confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
    };
    Recognition::new(text, confidence)
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, content: &[u8], _mime_type: &str) -> ExtractResult<Recognition> {
        let content = content.to_vec();
        let args = self.args();

        tokio::task::spawn_blocking(move || {
            let decoded = ::image::load_from_memory(&content)
                .map_err(|e| ExtractError::Image(e.to_string()))?;
            let gray = ::image::DynamicImage::ImageLuma8(decoded.to_luma8());
            let image = Image::from_dynamic_image(&gray).map_err(|e| ExtractError::Ocr {
                engine: ENGINE,
                message: e.to_string(),
            })?;
            let data = rusty_tesseract::image_to_data(&image, &args).map_err(|e| ExtractError::Ocr {
                engine: ENGINE,
                message: e.to_string(),
            })?;
            Ok(assemble(&data.data))
        })
        .await?
    }

    fn kind(&self) -> EngineKind {
        EngineKind::LocalOcr
    }

    fn name(&self) -> &str {
        ENGINE
    }
}
