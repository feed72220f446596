//! # Script Module
//!
//! Narration scripts: generated from property facts, combined from document
//! pages, or edited by hand. Whatever the origin, a script is split into tagged
//! sections before scene allocation.

pub mod format;
pub mod writer;

use crate::error::Result;
use crate::scene::ScriptSection;
use crate::sources::PropertyRecord;

pub use writer::{Script, TemplateScriptWriter};

/// Section order of a property narration
pub const CANONICAL_SECTIONS: [&str; 7] = [
    "intro",
    "case_overview",
    "price_info",
    "location_analysis",
    "property_details",
    "legal_notes",
    "closing",
];

/// Produces narration text for the two kinds of job input
pub trait ScriptGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Script for a property, sections in canonical order
    fn generate(&self, record: &PropertyRecord) -> Result<Script>;

    /// One plain-text script from per-page document text
    fn from_pages(&self, pages: &[String]) -> Result<String>;
}

/// Section texts separated by blank lines
pub fn join_sections(sections: &[ScriptSection]) -> String {
    sections
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split free text into paragraphs on blank lines and tag them
///
/// Exactly seven paragraphs take the canonical tags; any other count is tagged
/// `part_1`, `part_2`, ...
pub fn sections_from_text(text: &str) -> Vec<ScriptSection> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    let canonical = paragraphs.len() == CANONICAL_SECTIONS.len();
    paragraphs
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let tag = if canonical {
                CANONICAL_SECTIONS[i].to_string()
            } else {
                format!("part_{}", i + 1)
            };
            ScriptSection::new(tag, text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_split() {
        let sections = sections_from_text("First line\ncontinues\n\n\n  \nSecond\n\nThird  ");
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0], ScriptSection::new("part_1", "First line\ncontinues"));
        assert_eq!(sections[2], ScriptSection::new("part_3", "Third"));
    }

    #[test]
    fn test_seven_paragraphs_take_canonical_tags() {
        let text = (1..=7).map(|i| format!("Paragraph {}", i)).collect::<Vec<_>>().join("\n\n");
        let sections = sections_from_text(&text);
        assert_eq!(sections[0].tag, "intro");
        assert_eq!(sections[6].tag, "closing");
    }

    #[test]
    fn test_blank_text_has_no_sections() {
        assert!(sections_from_text(" \n\n\t").is_empty());
    }

    #[test]
    fn test_join_skips_blank_sections() {
        let sections = vec![
            ScriptSection::new("a", "one"),
            ScriptSection::new("b", "  "),
            ScriptSection::new("c", "two"),
        ];
        assert_eq!(join_sections(&sections), "one\n\ntwo");
    }
}
