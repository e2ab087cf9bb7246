//! System prompt for the "Laith" Levantine-Arabic tutor persona.
//!
//! The prompt is assembled from fixed rule blocks, the learner profile, the
//! lesson materials for `(level, week)`, language guidance for the learner's
//! target mode, and the tail of the conversation so far.

use std::fmt::Write;

use tutor::materials::MaterialItem;
use tutor::{Gender, LanguageMode, Message, ProficiencyLevel, Week};

/// Prior messages included as context.
pub const HISTORY_CONTEXT_MESSAGES: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct LearnerProfile {
    pub level: ProficiencyLevel,
    pub week: Week,
    pub gender: Gender,
    pub language: LanguageMode,
}

const FINAL_WARNING: &str = "\nIMPORTANT: If asked about anything not covered in these materials, redirect to content you \
                             CAN teach from the materials. ALWAYS use Levantine dialect exclusively.\n";

#[must_use]
pub fn language_guidance(language: LanguageMode) -> &'static str {
    match language {
        LanguageMode::Arabic => "\nRespond primarily in Arabic script with minimal explanations in Hebrew.\n",
        LanguageMode::Hebrew => {
            "\nProvide main responses in Hebrew, with Arabic phrases in both script and Hebrew transliteration.\n"
        }
        LanguageMode::EnglishTransliteration => "\nProvide Arabic responses with English transliteration, plus Hebrew explanations.\n",
    }
}

/// One material rendered as a single prompt line body.
#[must_use]
pub fn render_material(item: &MaterialItem) -> String {
    format!(
        "{} → {} ({}) [{}]",
        item.hebrew_input, item.arabic_response, item.pronunciation, item.id
    )
}

#[must_use]
pub fn build_teaching_prompt(profile: &LearnerProfile, materials: &[MaterialItem], history: &[Message]) -> String {
    let LearnerProfile { level, week, gender, language } = *profile;
    let mut prompt = format!(
        "You are 'Laith', an expert Levantine Arabic dialect tutor. Your ONLY task is teaching authentic spoken \
         Levant Arabic, NOT Modern Standard Arabic (MSA).

STRICT RULES:
1. ONLY use information from the provided reference materials. Do not introduce vocabulary, phrases or concepts \
not included in these materials.
2. NEVER use MSA (فصحى) forms - use EXCLUSIVELY Levantine dialect (لهجة شامية) as spoken in daily conversation.
3. IGNORE any questions unrelated to Levantine Arabic learning.

Student profile:
- Level: {level}
- Week: {week}
- Gender: {gender}
- Language: {language}

TEACHING APPROACH:
- AUTHENTICITY: Teach how natives actually speak, not textbook forms
- PERSONALIZATION: For beginners (level {level}, week {week}), use more {language}. For advanced, use more Arabic
- EXAMPLES: Every vocabulary item must include realistic usage examples
- PRONUNCIATION: Include Hebrew transliteration (תעתיק עברי) for all Arabic words
- GENDER: Use appropriate forms for {gender} students
- DIALOGUES: Create practice conversations using ONLY vocabulary from materials
"
    );

    prompt.push_str("\nYOU MUST EXCLUSIVELY USE THESE MATERIALS AS YOUR SOURCE:\n");
    for (i, item) in materials.iter().enumerate() {
        let _ = writeln!(prompt, "Material {}: {}", i + 1, render_material(item));
    }

    prompt.push_str(FINAL_WARNING);
    prompt.push_str(language_guidance(language));

    let start = history.len().saturating_sub(HISTORY_CONTEXT_MESSAGES);
    let recent = &history[start..];
    if !recent.is_empty() {
        prompt.push_str("\nPREVIOUS CONVERSATION CONTEXT:\n");
        for msg in recent {
            let role = if msg.is_from_user() { "Student" } else { "You (Laith)" };
            let _ = writeln!(prompt, "{role}: {}", msg.body);
        }
    }

    prompt
}

#[cfg(test)]
#[path = "prompt_test.rs"]
mod tests;
