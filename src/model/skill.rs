//! The static skill catalogue.

use serde::Serialize;

/// One service this gateway exposes to calling agents.
#[derive(Debug, Clone, Serialize)]
pub struct Skill {
    pub id: &'static str,
    pub price_smallest_unit: u64,
    pub input_modes: &'static [&'static str],
    pub output_modes: &'static [&'static str],
    pub description: &'static str,
}

impl Skill {
    pub fn requires_payment(&self) -> bool {
        self.price_smallest_unit > 0
    }
}

/// The four catalogued skills, grounded on `spec.md` §1/§3.
pub static SKILLS: &[Skill] = &[
    Skill {
        id: "screenshot",
        price_smallest_unit: 10_000,
        input_modes: &["text/plain"],
        output_modes: &["image/png"],
        description: "Capture a screenshot of a URL.",
    },
    Skill {
        id: "markdown-to-pdf",
        price_smallest_unit: 10_000,
        input_modes: &["text/markdown"],
        output_modes: &["application/pdf"],
        description: "Render Markdown to a PDF document.",
    },
    Skill {
        id: "markdown-to-html",
        price_smallest_unit: 0,
        input_modes: &["text/markdown"],
        output_modes: &["text/html"],
        description: "Render Markdown to an HTML fragment.",
    },
    Skill {
        id: "ai-analysis",
        price_smallest_unit: 20_000,
        input_modes: &["text/plain"],
        output_modes: &["application/json"],
        description: "Summarize or analyze text content with an AI model.",
    },
];

pub fn by_id(id: &str) -> Option<&'static Skill> {
    SKILLS.iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_has_four_skills() {
        assert_eq!(SKILLS.len(), 4);
    }

    #[test]
    fn only_markdown_to_html_is_free() {
        let free: Vec<_> = SKILLS
            .iter()
            .filter(|s| !s.requires_payment())
            .map(|s| s.id)
            .collect();
        assert_eq!(free, vec!["markdown-to-html"]);
    }

    #[test]
    fn by_id_finds_known_and_rejects_unknown() {
        assert!(by_id("screenshot").is_some());
        assert!(by_id("nonexistent").is_none());
    }
}
