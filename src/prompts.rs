//! Instruction templates for remote document extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: the extraction template, the synthetic
//!    fallbacks, and the image-annotation prompt live in exactly one place.
//!
//! 2. **Testability**: unit tests can inspect the built instructions without
//!    a live service.
//!
//! The primary template is user-supplied (a YAML document with a
//! `document_extraction_prompt` key containing a `{file_content}`
//! substitution point). When no template is configured the engine falls back
//! to the synthetic instructions below.

use crate::document::DocumentType;
use std::path::Path;
use tracing::{debug, warn};

/// YAML key holding the extraction template in the prompts document.
pub const EXTRACTION_PROMPT_KEY: &str = "document_extraction_prompt";

/// Substitution point inside the extraction template.
pub const CONTENT_PLACEHOLDER: &str = "{file_content}";

/// Interpolated into the template when the raw-content fetch fails.
/// The pipeline proceeds with this degraded prompt rather than aborting.
pub const RAW_CONTENT_UNAVAILABLE: &str =
    "[file content could not be retrieved; extract what you can from the uploaded document]";

/// Heading under which annotation output is appended to the primary result.
pub const FIGURES_SECTION_HEADER: &str = "\n\n---\n\n## Figures\n\n";

/// Load the extraction template from a YAML prompts file.
///
/// Returns `None` (and logs why) when the file is missing, unparsable, or
/// lacks the [`EXTRACTION_PROMPT_KEY`] key; the caller then uses the
/// synthetic instructions. A broken prompts file must never fail a run.
pub fn load_extraction_template(path: &Path) -> Option<String> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!("prompts file '{}' not readable: {}", path.display(), e);
            return None;
        }
    };
    let doc: serde_yaml::Value = match serde_yaml::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            warn!("prompts file '{}' is not valid YAML: {}", path.display(), e);
            return None;
        }
    };
    match doc.get(EXTRACTION_PROMPT_KEY).and_then(|v| v.as_str()) {
        Some(template) => {
            debug!("loaded extraction template from '{}'", path.display());
            Some(template.to_string())
        }
        None => {
            warn!(
                "prompts file '{}' has no '{}' key; using built-in instructions",
                path.display(),
                EXTRACTION_PROMPT_KEY
            );
            None
        }
    }
}

/// Substitute the file content into the template.
pub fn fill_template(template: &str, content: &str) -> String {
    template.replace(CONTENT_PLACEHOLDER, content)
}

/// Build the instruction for a whole-document extraction.
///
/// With a template, the fetched raw content (or the unavailable placeholder)
/// is interpolated. Without one, a minimal instruction referencing only the
/// remote file id and declared type is synthesised.
pub fn document_instruction(
    template: Option<&str>,
    raw_content: Option<&str>,
    file_id: &str,
    doc_type: DocumentType,
) -> String {
    match template {
        Some(t) => fill_template(t, raw_content.unwrap_or(RAW_CONTENT_UNAVAILABLE)),
        None => format!(
            "Please extract the content of the following document:\n\
             File id: {file_id}\n\
             File type: {}\n\
             Return the extracted information as a Markdown document.",
            doc_type.display_name()
        ),
    }
}

/// Build the instruction for a single chunk of a large document.
pub fn chunk_instruction(
    template: Option<&str>,
    chunk_text: &str,
    doc_type: DocumentType,
) -> String {
    match template {
        Some(t) => fill_template(t, chunk_text),
        None => format!(
            "Please extract the content of the following document fragment:\n\n\
             **Fragment:**\n{chunk_text}\n\n\
             **File type:** {}\n\n\
             **Requirements:**\n\
             1. Extract the key information and structured content\n\
             2. Preserve the logical structure of the original text\n\
             3. Produce clean Markdown\n\
             4. This is part of a larger document, so keep the content self-consistent\n\n\
             Begin.",
            doc_type.display_name()
        ),
    }
}

/// Build the secondary-analysis prompt for the image annotation pass.
///
/// Embeds the primary extraction output and asks the service to enumerate
/// and describe the figures it references.
pub fn annotation_prompt(primary_output: &str) -> String {
    format!(
        "Analyse the following extracted document content and identify every \
         figure or image it references:\n\n\
         **Document content:**\n{primary_output}\n\n\
         **Requirements:**\n\
         1. Locate each image reference and describe what it shows\n\
         2. Give each image a suitable title and description\n\
         3. If an image contains text, transcribe it\n\
         4. Return Markdown image syntax for each figure\n\n\
         **Output format:**\n\
         ![image title](image description)\n\
         Transcribed text (if any):\n\n\
         Begin the analysis."
    )
}
