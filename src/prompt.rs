//! Shot-list parsing and instruction construction

use crate::settings::GenerationSettings;

const PREAMBLE: &str = "Generate an image based on the following instructions.";

const STYLE_GUIDELINE: &str = "Style Guideline: Default to photorealistic, cinematic photography \
unless the prompt explicitly requests a different style (e.g. illustration, sketch, 3D render, pixel art).";

/// Split a shot list into prompts, one per non-blank line.
pub fn parse_prompt_list(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.to_string())
        .collect()
}

/// Build the natural-language instruction sent to the image model.
///
/// Order is fixed: style guideline, genre, theme, color, subject.
/// Empty optional fields are left out entirely.
pub fn build_instruction(prompt: &str, settings: &GenerationSettings) -> String {
    let mut out = String::with_capacity(prompt.len() + 320);
    out.push_str(PREAMBLE);
    out.push('\n');
    out.push_str(STYLE_GUIDELINE);
    out.push('\n');

    if !settings.category.is_empty() {
        out.push_str(&format!("Genre / Context: {}.\n", settings.category));
    }
    if !settings.theme.is_empty() {
        out.push_str(&format!("Theme / Mood: {}.\n", settings.theme));
    }
    if !settings.global_color_palette.is_empty() {
        out.push_str(&format!("Color Palette: {}.\n", settings.global_color_palette));
    }

    out.push_str(&format!("\nSubject / Action: {}", prompt));
    out
}
