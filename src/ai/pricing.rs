//! Per-Model Price Tables
//!
//! Static pricing used to estimate the cost of one model call from token
//! usage. Unknown model ids fall back to each table's designated default
//! row, so estimation never fails.

/// Input/output price for one model, in USD per `denominator` tokens.
#[derive(Debug, Clone, Copy)]
pub struct PriceRow {
    pub input: f64,
    pub output: f64,
}

/// Price table for one backend family.
#[derive(Debug)]
pub struct PriceTable {
    /// Token count the row prices are quoted against (1K or 1M)
    denominator: f64,
    rows: &'static [(&'static str, PriceRow)],
    /// Index of the row used for unknown model ids
    default_index: usize,
}

impl PriceTable {
    pub const fn new(
        denominator: f64,
        rows: &'static [(&'static str, PriceRow)],
        default_index: usize,
    ) -> Self {
        Self {
            denominator,
            rows,
            default_index,
        }
    }

    fn row_for(&self, model: &str) -> PriceRow {
        self.rows
            .iter()
            .find(|(id, _)| *id == model)
            .map(|(_, row)| *row)
            .unwrap_or(self.rows[self.default_index].1)
    }

    /// Estimate cost in USD. Monotonically non-decreasing in both counts.
    pub fn estimate(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        let row = self.row_for(model);
        (input_tokens as f64 / self.denominator) * row.input
            + (output_tokens as f64 / self.denominator) * row.output
    }
}

/// OpenAI pricing, USD per 1K tokens.
pub static OPENAI_PRICES: PriceTable = PriceTable::new(
    1_000.0,
    &[
        ("gpt-4-turbo", PriceRow { input: 0.01, output: 0.03 }),
        ("gpt-4", PriceRow { input: 0.03, output: 0.06 }),
        ("gpt-4-turbo-preview", PriceRow { input: 0.01, output: 0.03 }),
        ("gpt-4o", PriceRow { input: 0.005, output: 0.015 }),
        ("gpt-5", PriceRow { input: 0.01, output: 0.03 }),
    ],
    0,
);

/// Anthropic pricing, USD per 1M tokens.
pub static CLAUDE_PRICES: PriceTable = PriceTable::new(
    1_000_000.0,
    &[
        ("claude-3-opus-20240229", PriceRow { input: 15.00, output: 75.00 }),
        ("claude-3-sonnet-20240229", PriceRow { input: 3.00, output: 15.00 }),
        ("claude-3-haiku-20240307", PriceRow { input: 0.25, output: 1.25 }),
    ],
    1,
);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_model_priced() {
        // 1000 input + 1000 output on gpt-4o: 0.005 + 0.015
        let cost = OPENAI_PRICES.estimate("gpt-4o", 1000, 1000);
        assert!((cost - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_uses_default_row() {
        let unknown = OPENAI_PRICES.estimate("gpt-99-experimental", 1000, 1000);
        let default = OPENAI_PRICES.estimate("gpt-4-turbo", 1000, 1000);
        assert!((unknown - default).abs() < 1e-12);

        let unknown = CLAUDE_PRICES.estimate("claude-next", 1_000_000, 0);
        assert!((unknown - 3.00).abs() < 1e-9);
    }

    #[test]
    fn test_zero_tokens_zero_cost() {
        assert_eq!(OPENAI_PRICES.estimate("gpt-4", 0, 0), 0.0);
        assert_eq!(CLAUDE_PRICES.estimate("claude-3-haiku-20240307", 0, 0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_cost_monotone_in_both_counts(
            input in 0u32..200_000,
            output in 0u32..200_000,
            d_in in 0u32..10_000,
            d_out in 0u32..10_000,
        ) {
            let base = OPENAI_PRICES.estimate("gpt-4o", input, output);
            let more_in = OPENAI_PRICES.estimate("gpt-4o", input + d_in, output);
            let more_out = OPENAI_PRICES.estimate("gpt-4o", input, output + d_out);
            prop_assert!(more_in >= base);
            prop_assert!(more_out >= base);
        }

        #[test]
        fn prop_cost_never_negative(input in 0u32..1_000_000, output in 0u32..1_000_000) {
            prop_assert!(CLAUDE_PRICES.estimate("claude-3-opus-20240229", input, output) >= 0.0);
        }
    }
}
