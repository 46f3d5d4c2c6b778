//! Engine-level types.

/// Text recognized on one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    /// Recognized text.
    pub text: String,
    /// Engine-reported confidence in `[0, 1]`, when the engine reports one.
    pub confidence: Option<f32>,
}

impl Recognition {
    /// Create a recognition with an engine-reported confidence.
    pub fn new(text: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.map(|c| c.clamp(0.0, 1.0)),
        }
    }

    /// Number of non-whitespace characters.
    pub fn meaningful_len(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }

    /// Check if recognition produced meaningful content.
    pub fn is_empty(&self) -> bool {
        self.meaningful_len() == 0
    }
}

/// One rasterized page ready for OCR.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number.
    pub page: usize,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime_type: String,
}

impl PageImage {
    pub fn new(page: usize, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            page,
            bytes,
            mime_type: mime_type.into(),
        }
    }
}
