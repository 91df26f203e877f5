//! Model pricing table
//!
//! Prices are USD per 1000 tokens. Lookup is case-insensitive substring
//! matching on the model id, so "claude-sonnet-4.5" and "CLAUDE-3-HAIKU"
//! both resolve to the claude entry. Unknown models fall back to a
//! conservative default.

use serde::{Deserialize, Serialize};

/// USD per 1000 tokens for one model family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

const CLAUDE: ModelPricing = ModelPricing {
    input: 0.003,
    output: 0.015,
};

const GPT_4O: ModelPricing = ModelPricing {
    input: 0.0025,
    output: 0.01,
};

const GEMINI: ModelPricing = ModelPricing {
    input: 0.00125,
    output: 0.005,
};

/// Fallback pricing for model ids no family matches.
pub const DEFAULT_PRICING: ModelPricing = ModelPricing {
    input: 0.002,
    output: 0.008,
};

impl ModelPricing {
    /// Resolve the pricing for a model id.
    pub fn for_model(model: &str) -> ModelPricing {
        let id = model.to_lowercase();
        if id.contains("claude") {
            CLAUDE
        } else if id.contains("gpt-4o") {
            GPT_4O
        } else if id.contains("gemini") {
            GEMINI
        } else {
            DEFAULT_PRICING
        }
    }

    /// USD for a concrete token count.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input + (output_tokens as f64 / 1000.0) * self.output
    }
}
