//! Shared presentation helpers.

use crate::types::GenerationTier;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Tier name colored by how much of the pipeline succeeded.
pub fn tier_label(tier: GenerationTier) -> String {
    match tier {
        GenerationTier::Full => format!("{}", tier.as_str().green()),
        GenerationTier::PlanOnly => format!("{}", tier.as_str().yellow()),
        GenerationTier::Static => format!("{}", tier.as_str().red()),
    }
}
