//! Local study profile acquisition.

use crate::llm::CompletionService;
use crate::prompts;
use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

/// Load a prepared profile from `path`.
pub fn load_profile(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile: {}", path.display()))?;

    let text = text.trim();
    if text.is_empty() {
        bail!("Profile file is empty: {}", path.display());
    }

    Ok(text.to_string())
}

/// Build a structured profile from raw study text with one completion call.
pub async fn synthesize_profile(completion: &dyn CompletionService, source_text: &str) -> Result<String> {
    if source_text.trim().is_empty() {
        bail!("Source text is empty");
    }

    let profile = completion
        .complete(prompts::ANALYST_SYSTEM_PROMPT, &prompts::profile_prompt(source_text))
        .await
        .context("Failed to synthesize the local study profile")?;

    let profile = profile.trim();
    if profile.is_empty() {
        bail!("Completion service returned an empty profile");
    }

    info!("Synthesized local study profile ({} chars)", profile.len());
    Ok(profile.to_string())
}
