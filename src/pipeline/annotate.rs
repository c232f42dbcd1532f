//! Image annotation pass: a conditional secondary analysis call.
//!
//! Applied only to normal-path results. When the primary output appears to
//! reference figures, one extra generation call asks the service to
//! enumerate and describe them; a useful answer is appended under a
//! delimited section. The trigger is a blunt substring heuristic; its
//! precision is an open question, but the pass is non-fatal, so a false
//! positive costs one wasted call and changes nothing.

use crate::client::{with_retries, GenerationOptions, RemoteService};
use crate::config::ExtractionConfig;
use crate::prompts;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output-token cap for the secondary analysis call.
pub const ANNOTATION_MAX_TOKENS: u32 = 2_000;

/// Whether the text appears to reference images: a Markdown image
/// placeholder, or a literal "image" token in English or Chinese.
pub fn has_image_marker(text: &str) -> bool {
    text.contains("![") || text.contains("图片") || text.to_ascii_lowercase().contains("image")
}

/// Run the annotation pass over a primary extraction result.
///
/// Returns the (possibly augmented) text and whether a figures section was
/// appended. Never fails: every error kind preserves the primary output.
pub async fn maybe_annotate(
    service: &Arc<dyn RemoteService>,
    config: &ExtractionConfig,
    primary: String,
) -> (String, bool) {
    if !config.annotate_images || !has_image_marker(&primary) {
        return (primary, false);
    }
    info!("primary output references images; running annotation pass");

    let prompt = prompts::annotation_prompt(&primary);
    let opts = GenerationOptions {
        max_tokens: ANNOTATION_MAX_TOKENS,
        timeout: config.secondary_timeout,
    };

    let result = with_retries(
        "image annotation",
        config.secondary_attempts,
        config.transfer_retry_delay,
        || service.generate(&prompt, &opts),
    )
    .await;

    match result {
        Ok(description) if description.contains("![") => {
            debug!(
                "annotation pass produced {} chars of figure descriptions",
                description.chars().count()
            );
            let mut augmented = primary;
            augmented.push_str(prompts::FIGURES_SECTION_HEADER);
            augmented.push_str(&description);
            (augmented, true)
        }
        Ok(_) => {
            debug!("annotation output carried no image syntax; keeping primary output");
            (primary, false)
        }
        Err(e) => {
            warn!("annotation pass failed (non-fatal): {e}");
            (primary, false)
        }
    }
}
