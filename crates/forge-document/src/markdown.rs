//! Markdown rendering for generated question sets.
//!
//! The output is laid out the same way as the printed interview sheet:
//!
//! - A title naming the topic and the generation date
//! - One section per difficulty level, in the requested order
//! - Numbered questions with their category label, each followed by its answer
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use forge_document::{DocumentInput, MarkdownRenderer};
//!
//! let input = DocumentInput::new("Negotiation", Utc::now());
//! let markdown = MarkdownRenderer.generate(&input);
//! assert!(markdown.starts_with("# Leadership Interview: Negotiation"));
//! ```

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::{
    document_filename, DocumentEntry, DocumentFormat, DocumentInput, DocumentRenderer,
    DocumentSection, RenderedDocument, Result,
};

/// Renders documents as Markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    /// Generates the complete Markdown document.
    #[must_use]
    pub fn generate(&self, input: &DocumentInput) -> String {
        let mut output = String::new();

        Self::write_title(&mut output, input);
        for section in &input.sections {
            Self::write_section(&mut output, section);
        }
        Self::write_footer(&mut output, input.generated_at);

        output
    }

    fn write_title(output: &mut String, input: &DocumentInput) {
        let _ = writeln!(
            output,
            "# Leadership Interview: {}\n",
            escape_markdown(&input.topic)
        );
        let _ = writeln!(output, "Generated: {}\n", format_date(&input.generated_at));
    }

    fn write_section(output: &mut String, section: &DocumentSection) {
        let _ = writeln!(
            output,
            "## {} Level\n",
            escape_markdown(&section.difficulty)
        );

        for (index, entry) in section.entries.iter().enumerate() {
            Self::write_entry(output, index + 1, entry);
        }
    }

    fn write_entry(output: &mut String, number: usize, entry: &DocumentEntry) {
        let _ = writeln!(
            output,
            "**Q{number} {}:** {}\n",
            entry.category.label(),
            escape_markdown(&entry.question)
        );
        let _ = writeln!(output, "**A:** {}\n", escape_markdown(&entry.answer));
    }

    fn write_footer(output: &mut String, generated_at: DateTime<Utc>) {
        let _ = writeln!(output, "---");
        let _ = writeln!(
            output,
            "*Generated by Interview Forge at {}*",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}

impl DocumentRenderer for MarkdownRenderer {
    fn render(&self, input: &DocumentInput) -> Result<RenderedDocument> {
        input.validate()?;
        Ok(RenderedDocument {
            filename: document_filename(
                &input.topic,
                input.generated_at,
                DocumentFormat::Markdown.extension(),
            ),
            content_type: "text/markdown; charset=utf-8",
            body: self.generate(input),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Formats a date the way the printed sheet does (e.g. "March 04, 2026").
fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%B %d, %Y").to_string()
}

/// Escapes characters that would otherwise change Markdown emphasis or
/// inject HTML. Newlines collapse to spaces.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' | '\r' => result.push(' '),
            _ => result.push(ch),
        }
    }

    result
}
