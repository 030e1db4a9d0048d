use std::time::Duration;

use crate::Locale;

/// Qualitative reading of how a message was composed, in rule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorClass {
    /// Fast, few edits, non-empty result.
    Decisive,
    /// Long, heavily edited or many backspaces.
    Deliberate,
    /// Several edits with repeated corrections.
    Iterative,
    /// Something was typed and then fully removed.
    Abandoned,
    Standard,
}

impl BehaviorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorClass::Decisive => "decisive",
            BehaviorClass::Deliberate => "deliberate",
            BehaviorClass::Iterative => "iterative",
            BehaviorClass::Abandoned => "abandoned",
            BehaviorClass::Standard => "standard",
        }
    }
}

impl std::fmt::Display for BehaviorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw measurements the classification rules read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviorInput {
    pub duration: Duration,
    pub edit_count: usize,
    pub backspace_count: u32,
    pub final_length: usize,
    pub thinking: bool,
}

/// First matching rule wins. Rules 2 and 3 overlap; 2 takes precedence.
pub fn classify(input: &BehaviorInput) -> BehaviorClass {
    let ms = input.duration.as_millis();
    if ms < 2000 && input.edit_count <= 1 && input.final_length > 0 {
        BehaviorClass::Decisive
    } else if ms > 15_000 || input.edit_count > 5 || input.backspace_count > 10 {
        BehaviorClass::Deliberate
    } else if input.edit_count > 2 && input.backspace_count > 3 {
        BehaviorClass::Iterative
    } else if input.final_length == 0 && ms > 1000 {
        BehaviorClass::Abandoned
    } else {
        BehaviorClass::Standard
    }
}

/// Interpretation sentence for `input`, with the pause suffix when flagged.
pub fn interpret(input: &BehaviorInput, locale: Locale) -> String {
    let mut out = String::from(locale.class_sentence(classify(input)));
    if input.thinking {
        out.push_str(locale.thinking_suffix());
    }
    out
}
