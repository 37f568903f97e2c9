//! Cost estimation.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::request::Operation;

/// Per-unit prices for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CostRates {
    pub base: Decimal,
    pub per_retrieval_hit: Decimal,
    pub per_prediction: Decimal,
    pub per_generation_token: Decimal,
}

impl CostRates {
    pub fn new(
        base: Decimal,
        per_retrieval_hit: Decimal,
        per_prediction: Decimal,
        per_generation_token: Decimal,
    ) -> Self {
        Self {
            base,
            per_retrieval_hit,
            per_prediction,
            per_generation_token,
        }
    }
}

/// Cost rates keyed by operation. Operations without rates cost nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostModel {
    rates: HashMap<Operation, CostRates>,
}

impl CostModel {
    /// A model with no rates; every estimate is zero.
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    pub fn with_rates(mut self, operation: Operation, rates: CostRates) -> Self {
        self.rates.insert(operation, rates);
        self
    }

    pub fn rates(&self, operation: Operation) -> CostRates {
        self.rates.get(&operation).copied().unwrap_or_default()
    }

    pub fn estimate(&self, operation: Operation, usage: &CostMeter) -> Decimal {
        usage.price(&self.rates(operation))
    }
}

impl Default for CostModel {
    fn default() -> Self {
        // Prices in USD.
        Self::empty()
            .with_rates(
                Operation::Chat,
                CostRates::new(
                    Decimal::new(1, 3),
                    Decimal::new(1, 4),
                    Decimal::new(5, 5),
                    Decimal::new(2, 6),
                ),
            )
            .with_rates(
                Operation::Search,
                CostRates::new(
                    Decimal::new(5, 4),
                    Decimal::new(1, 4),
                    Decimal::new(5, 5),
                    Decimal::ZERO,
                ),
            )
            .with_rates(
                Operation::Checkout,
                CostRates::new(Decimal::new(2, 3), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            )
            .with_rates(
                Operation::Analytics,
                CostRates::new(Decimal::new(1, 3), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            )
    }
}

/// Usage units consumed while serving one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostMeter {
    pub base_charged: bool,
    pub retrieval_hits: u64,
    pub predictions: u64,
    pub generation_tokens: u64,
}

impl CostMeter {
    /// Marks the request as dispatched; validation failures are free.
    pub fn charge_base(&mut self) {
        self.base_charged = true;
    }

    pub fn add_retrieval_hits(&mut self, hits: u64) {
        self.retrieval_hits = self.retrieval_hits.saturating_add(hits);
    }

    pub fn add_predictions(&mut self, predictions: u64) {
        self.predictions = self.predictions.saturating_add(predictions);
    }

    pub fn add_generation_tokens(&mut self, tokens: u64) {
        self.generation_tokens = self.generation_tokens.saturating_add(tokens);
    }

    pub fn price(&self, rates: &CostRates) -> Decimal {
        let base = if self.base_charged {
            rates.base
        } else {
            Decimal::ZERO
        };
        base + rates.per_retrieval_hit * Decimal::from(self.retrieval_hits)
            + rates.per_prediction * Decimal::from(self.predictions)
            + rates.per_generation_token * Decimal::from(self.generation_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_sums_base_and_units() {
        let model = CostModel::empty().with_rates(
            Operation::Chat,
            CostRates::new(
                Decimal::new(10, 3),
                Decimal::new(1, 3),
                Decimal::new(2, 3),
                Decimal::new(1, 4),
            ),
        );
        let mut usage = CostMeter::default();
        usage.charge_base();
        usage.add_retrieval_hits(3);
        usage.add_predictions(2);
        usage.add_generation_tokens(100);

        // 0.010 + 3 * 0.001 + 2 * 0.002 + 100 * 0.0001
        assert_eq!(model.estimate(Operation::Chat, &usage), Decimal::new(27, 3));
    }

    #[test]
    fn test_unpriced_operation_costs_nothing() {
        let mut usage = CostMeter::default();
        usage.charge_base();
        usage.add_retrieval_hits(10);
        assert_eq!(
            CostModel::empty().estimate(Operation::Search, &usage),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_base_only_charged_after_dispatch() {
        let model = CostModel::default();
        let usage = CostMeter::default();
        assert_eq!(model.estimate(Operation::Checkout, &usage), Decimal::ZERO);
    }
}
