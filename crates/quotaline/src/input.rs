use crate::error::{QuotalineError, Result};
use serde::Deserialize;
use std::io::Read;

/// Session description Claude Code pipes to the status line command.
#[derive(Debug, Default, Deserialize)]
pub struct StatusInput {
    #[serde(default)]
    pub model: ModelInfo,
    #[serde(default)]
    pub context_window: ContextWindow,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContextWindow {
    #[serde(default)]
    pub total_input_tokens: u64,
    #[serde(default)]
    pub total_output_tokens: u64,
}

impl StatusInput {
    /// Decode the first JSON value on `reader`. Anything after it is ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::Deserializer::from_reader(reader)
            .into_iter::<StatusInput>()
            .next()
            .ok_or_else(|| QuotalineError::Input("no input on stdin".to_string()))?
            .map_err(|e| QuotalineError::Input(e.to_string()))
    }

    pub fn total_tokens(&self) -> u64 {
        self.context_window
            .total_input_tokens
            .saturating_add(self.context_window.total_output_tokens)
    }
}
