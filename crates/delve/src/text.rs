//! # Text Generation
//!
//! The narrow interface to the external text service used for lore,
//! space descriptions and free-text exit parsing.
//!
//! The engine never depends on the service succeeding. Every caller falls
//! back to `TemplateTextGenerator`, which is deterministic and offline.

use async_trait::async_trait;
use delve_core::{BiomeTheme, ChunkLevel, NodeType};
use thiserror::Error;
use tracing::warn;

/// Answer an exit parse returns when no offered label fits.
pub const NO_MATCH: &str = "none";

/// Errors a text service may report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextGenError {
    /// The service could not be reached.
    #[error("text service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the prompt.
    #[error("text service rejected the prompt: {0}")]
    Rejected(String),

    /// The service answered with nothing.
    #[error("text service returned no text")]
    Empty,
}

/// What a prompt asks for.
#[derive(Clone, Debug, PartialEq)]
pub enum PromptKind {
    /// Lore for a child chunk.
    Lore {
        /// Level of the child.
        level: ChunkLevel,
        /// Theme of the parent.
        parent_theme: BiomeTheme,
    },
    /// Description of one space.
    Space {
        /// Structural type of the space.
        node_type: NodeType,
        /// Types of the visible neighbours.
        neighbours: Vec<NodeType>,
    },
    /// Map a phrase onto one of the offered exit labels.
    ExitParse {
        /// The phrase as typed.
        phrase: String,
        /// The only acceptable answers besides `NO_MATCH`.
        options: Vec<String>,
    },
}

/// Everything a text service sees for one request.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptContext {
    /// Request kind and its specific inputs.
    pub kind: PromptKind,
    /// Theme of the chunk being written about.
    pub theme: BiomeTheme,
    /// Inherited lore.
    pub lore: String,
    /// Variation seed for deterministic renderers.
    pub variation: u64,
}

impl PromptContext {
    /// Prompt for a child chunk's lore.
    #[must_use]
    pub fn lore(
        parent_lore: &str,
        parent_theme: BiomeTheme,
        level: ChunkLevel,
        theme: BiomeTheme,
        variation: u64,
    ) -> Self {
        Self {
            kind: PromptKind::Lore {
                level,
                parent_theme,
            },
            theme,
            lore: parent_lore.to_string(),
            variation,
        }
    }

    /// Prompt for a space description.
    #[must_use]
    pub fn space(
        node_type: NodeType,
        neighbours: Vec<NodeType>,
        lore: &str,
        theme: BiomeTheme,
        variation: u64,
    ) -> Self {
        Self {
            kind: PromptKind::Space {
                node_type,
                neighbours,
            },
            theme,
            lore: lore.to_string(),
            variation,
        }
    }

    /// Prompt for a free-text exit parse.
    #[must_use]
    pub fn exit(phrase: &str, options: Vec<String>, theme: BiomeTheme) -> Self {
        Self {
            kind: PromptKind::ExitParse {
                phrase: phrase.to_string(),
                options,
            },
            theme,
            lore: String::new(),
            variation: 0,
        }
    }
}

/// External text-generation collaborator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produces text for the prompt.
    async fn generate(&self, context: &PromptContext) -> Result<String, TextGenError>;
}

/// Asks `generator`, falling back to the template on failure or empty text.
pub async fn generate_or_fallback(generator: &dyn TextGenerator, context: &PromptContext) -> String {
    match generator.generate(context).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("text service returned empty text, using template");
            TemplateTextGenerator.render(context)
        }
        Err(e) => {
            warn!(error = %e, "text service failed, using template");
            TemplateTextGenerator.render(context)
        }
    }
}

// =============================================================================
// TEMPLATES
// =============================================================================

const LORE_TURNS: [&str; 6] = [
    "Older hands shaped what came after.",
    "Something down here remembers the surface.",
    "The air grows colder with every step.",
    "Whatever lived here left in a hurry.",
    "Few maps reach this far.",
    "The walls carry marks no one can read.",
];

const SPACE_DETAILS: [&str; 5] = [
    "Dust lies undisturbed in the corners.",
    "A draft tugs at the edges of the light.",
    "Water drips somewhere out of sight.",
    "Scratches on the floor lead nowhere in particular.",
    "The silence here feels attentive.",
];

/// Deterministic offline renderer; also the fallback for every caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateTextGenerator;

impl TemplateTextGenerator {
    /// Renders the prompt from fixed templates.
    #[must_use]
    pub fn render(self, context: &PromptContext) -> String {
        match &context.kind {
            PromptKind::Lore {
                level,
                parent_theme,
            } => {
                let opening = first_sentence(&context.lore);
                let turn = pick(&LORE_TURNS, context.variation);
                if *parent_theme == context.theme {
                    format!("{opening} This {level} of the {} runs deeper. {turn}", context.theme)
                } else {
                    format!(
                        "{opening} Here the {parent_theme} gives way to {}. {turn}",
                        context.theme
                    )
                }
            }
            PromptKind::Space {
                node_type,
                neighbours,
            } => {
                let detail = pick(&SPACE_DETAILS, context.variation);
                let exits = match neighbours.len() {
                    0 => "No way onward is obvious.".to_string(),
                    1 => "A single way leads on.".to_string(),
                    n => format!("{n} ways lead on."),
                };
                format!(
                    "{} {} {exits} {detail}",
                    room_phrase(*node_type, context.theme),
                    first_sentence(&context.lore)
                )
            }
            PromptKind::ExitParse { phrase, options } => {
                let words: Vec<String> = phrase
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .map(str::to_lowercase)
                    .collect();
                let found: Vec<&String> = options
                    .iter()
                    .filter(|option| {
                        let option = option.to_lowercase();
                        let parts: Vec<&str> = option.split_whitespace().collect();
                        !parts.is_empty()
                            && words.windows(parts.len()).any(|window| window == parts.as_slice())
                    })
                    .collect();
                match found.as_slice() {
                    [only] => (*only).clone(),
                    _ => NO_MATCH.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl TextGenerator for TemplateTextGenerator {
    async fn generate(&self, context: &PromptContext) -> Result<String, TextGenError> {
        Ok(self.render(context))
    }
}

fn pick<'a>(choices: &[&'a str], variation: u64) -> &'a str {
    choices[(variation % choices.len() as u64) as usize]
}

fn first_sentence(text: &str) -> &str {
    let text = text.trim();
    match text.find(". ") {
        Some(end) => &text[..=end],
        None => text,
    }
}

fn room_phrase(node_type: NodeType, theme: BiomeTheme) -> String {
    match node_type {
        NodeType::Hub => format!("A sheltered hall of the {theme}, quiet and defensible."),
        NodeType::Linear => format!("A narrow stretch of {theme}."),
        NodeType::Branching => format!("A junction in the {theme} where paths split."),
        NodeType::DeadEnd => format!("The {theme} ends abruptly here."),
        NodeType::TreasureRoom => format!("A hidden cache deep in the {theme}."),
        NodeType::Boss => format!("The lair at the heart of the {theme}."),
        NodeType::Frontier => format!("The edge of the known {theme}; the way beyond is unmapped."),
        NodeType::Questable => format!("A chamber of the {theme} where someone waits."),
    }
}
