//! Pluggable cost estimation: `cost(model, prompt, completion) -> real`.
//!
//! The default implementation reads a static per-model rate table; callers
//! needing exact provider billing can supply their own [CostOracle].

use crate::request::ChatMessage;

/// Per-token pricing for a model, in dollars.
#[derive(Debug, Clone, Copy)]
struct ModelRate {
    input_per_token: f64,
    output_per_token: f64,
}

mod gpt4o_pricing {
    use super::ModelRate;
    pub const RATE: ModelRate = ModelRate {
        input_per_token: 2.50 / 1_000_000.0,
        output_per_token: 10.00 / 1_000_000.0,
    };
}

mod gpt4o_mini_pricing {
    use super::ModelRate;
    pub const RATE: ModelRate = ModelRate {
        input_per_token: 0.15 / 1_000_000.0,
        output_per_token: 0.60 / 1_000_000.0,
    };
}

mod gpt4_1_pricing {
    use super::ModelRate;
    pub const RATE: ModelRate = ModelRate {
        input_per_token: 2.00 / 1_000_000.0,
        output_per_token: 8.00 / 1_000_000.0,
    };
}

mod o1_pricing {
    use super::ModelRate;
    pub const RATE: ModelRate = ModelRate {
        input_per_token: 15.00 / 1_000_000.0,
        output_per_token: 60.00 / 1_000_000.0,
    };
}

const DEFAULT_RATE: ModelRate = ModelRate {
    input_per_token: 1.00 / 1_000_000.0,
    output_per_token: 3.00 / 1_000_000.0,
};

fn rate_for(model: &str) -> ModelRate {
    if model.starts_with("gpt-4o-mini") {
        gpt4o_mini_pricing::RATE
    } else if model.starts_with("gpt-4o") {
        gpt4o_pricing::RATE
    } else if model.starts_with("gpt-4.1") {
        gpt4_1_pricing::RATE
    } else if model.starts_with("o1") || model.starts_with("o3") {
        o1_pricing::RATE
    } else {
        DEFAULT_RATE
    }
}

/// A very rough stand-in for a real tokenizer: about 4 characters per token,
/// the same heuristic the provider documents for estimating context usage.
fn estimate_tokens(text: &str) -> f64 {
    (text.chars().count() as f64 / 4.0).max(1.0)
}

/// Contract: `cost(model, prompt, completion) -> real`, pluggable so callers
/// can swap in exact provider billing or a deterministic value in tests.
pub trait CostOracle: Send + Sync {
    fn cost(&self, model: &str, prompt: &[ChatMessage], completion: &str) -> f64;
}

/// Reads the static per-model rate table above.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableCostOracle;

impl CostOracle for TableCostOracle {
    fn cost(&self, model: &str, prompt: &[ChatMessage], completion: &str) -> f64 {
        let rate = rate_for(model);
        let prompt_tokens: f64 = prompt.iter().map(|m| estimate_tokens(&m.content)).sum();
        let completion_tokens = estimate_tokens(completion);
        prompt_tokens * rate.input_per_token + completion_tokens * rate.output_per_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_scales_with_model_rate() {
        let oracle = TableCostOracle;
        let prompt = vec![ChatMessage::new("user", "a".repeat(400))];
        let mini = oracle.cost("gpt-4o-mini", &prompt, &"b".repeat(40));
        let full = oracle.cost("gpt-4o", &prompt, &"b".repeat(40));
        assert!(full > mini);
    }
}
