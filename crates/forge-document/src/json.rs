//! JSON rendering for generated question sets.
//!
//! Serializes the [`DocumentInput`] as pretty-printed JSON, which is handy
//! for importing a question set into other tools.

use crate::{document_filename, DocumentFormat, DocumentInput, DocumentRenderer, RenderedDocument, Result};

/// Renders documents as pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl JsonRenderer {
    /// Generates pretty-printed JSON output with indentation.
    pub fn generate_pretty(&self, input: &DocumentInput) -> Result<String> {
        Ok(serde_json::to_string_pretty(input)?)
    }
}

impl DocumentRenderer for JsonRenderer {
    fn render(&self, input: &DocumentInput) -> Result<RenderedDocument> {
        input.validate()?;
        Ok(RenderedDocument {
            filename: document_filename(
                &input.topic,
                input.generated_at,
                DocumentFormat::Json.extension(),
            ),
            content_type: "application/json",
            body: self.generate_pretty(input)?,
        })
    }
}
