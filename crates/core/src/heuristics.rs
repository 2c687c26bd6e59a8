//! Name-based input classification and composite sub-key resolution.
//!
//! Workflows expose model pickers under arbitrary names and shapes
//! (`ckpt_name` strings, LoRA-stack objects with `on`/`lora`/`strength`
//! fields, ...). Classification is an ordered rule table of
//! case-insensitive substring tests on the input name; the first
//! matching rule wins. A seed flag on the spec always takes priority.

use crate::schema::InputSpec;
use crate::value::{Composite, InputValue};

// ---------------------------------------------------------------------------
// Categories and rules
// ---------------------------------------------------------------------------

/// How an input is edited and submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Pick from the checkpoint listing.
    CheckpointSelect,
    /// Pick from the LoRA listing (with a clear action).
    LoraSelect,
    /// Driven by the seed policy rather than edited directly.
    Seed,
    /// Header/widget plumbing: never rendered, never submitted.
    Suppressed,
    /// Edited according to the declared type.
    Plain,
}

/// One row of the classification table.
///
/// Matches when the lowercased name contains at least one `any_of`
/// pattern and none of the `none_of` patterns.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    pub any_of: &'static [&'static str],
    pub none_of: &'static [&'static str],
    pub category: Category,
}

impl ClassificationRule {
    pub fn matches(&self, lowered_name: &str) -> bool {
        self.any_of.iter().any(|p| lowered_name.contains(p))
            && !self.none_of.iter().any(|p| lowered_name.contains(p))
    }
}

/// Ordered name rules. Evaluated after the seed flag; falls through to
/// [`Category::Plain`].
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        any_of: &["header", "widget"],
        none_of: &[],
        category: Category::Suppressed,
    },
    ClassificationRule {
        any_of: &["ckpt", "checkpoint"],
        none_of: &[],
        category: Category::CheckpointSelect,
    },
    ClassificationRule {
        any_of: &["lora"],
        none_of: &["weight", "strength", "header", "widget"],
        category: Category::LoraSelect,
    },
];

/// Classify an input by name alone.
pub fn classify(input_name: &str) -> Category {
    let lowered = input_name.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.category)
        .unwrap_or(Category::Plain)
}

/// Classify an input spec; the seed flag wins over any name rule.
pub fn classify_input(spec: &InputSpec) -> Category {
    if spec.is_seed {
        Category::Seed
    } else {
        classify(&spec.name)
    }
}

// ---------------------------------------------------------------------------
// Composite sub-key resolution
// ---------------------------------------------------------------------------

/// Sub-keys probed, in priority order, when writing a checkpoint into a
/// composite value. The first entry doubles as the fallback.
pub const CHECKPOINT_SUBKEYS: &[&str] = &[
    "ckpt_name",
    "checkpoint",
    "model",
    "name",
    "ckpt",
    "file",
    "filename",
];

/// Sub-keys probed, in priority order, when writing a LoRA into a
/// composite value.
pub const LORA_SUBKEYS: &[&str] = &["lora", "lora_name", "model", "file", "filename"];

/// Sub-key written when no LoRA candidate is present, and the one
/// cleared by a LoRA removal.
pub const LORA_DEFAULT_SUBKEY: &str = "lora";

/// Enable toggle carried by LoRA-stack composites.
pub const LORA_ENABLED_SUBKEY: &str = "on";

/// Sentinel the backend reads as "no LoRA".
pub const LORA_NONE: &str = "None";

/// First candidate present in `composite`, or `fallback`.
pub fn select_subkey<'a>(
    composite: &Composite,
    candidates: &[&'a str],
    fallback: &'a str,
) -> &'a str {
    candidates
        .iter()
        .copied()
        .find(|key| composite.contains_key(*key))
        .unwrap_or(fallback)
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

/// Normalise a listing filename for display (`\` becomes `/`).
///
/// Storage always keeps the raw name from the listing endpoint.
pub fn display_name(raw: &str) -> String {
    raw.replace('\\', "/")
}

/// Render a stored value for display.
///
/// Model pickers show the sub-key the matching setter would write,
/// normalised for display; everything else uses the value's plain form.
pub fn display_value(category: Category, value: &InputValue) -> String {
    let candidates: (&[&str], &str) = match category {
        Category::CheckpointSelect => (CHECKPOINT_SUBKEYS, CHECKPOINT_SUBKEYS[0]),
        Category::LoraSelect => (LORA_SUBKEYS, LORA_DEFAULT_SUBKEY),
        _ => return value.to_string(),
    };

    match value {
        InputValue::Composite(map) => {
            let key = select_subkey(map, candidates.0, candidates.1);
            map.get(key)
                .map(|v| display_name(&v.to_string()))
                .unwrap_or_default()
        }
        other => display_name(&other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
