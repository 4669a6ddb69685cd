//! # Heuristic Acceptance Predictor
//!
//! Used when no trained model is wired in. Weighted sum of four signals:
//!
//! ```text
//! p = 0.3 × min(loyalty / 10, 1)        repeat customers accept more
//!   + 0.2 × min(gap / 120, 1)           longer gaps fit more services
//!   + 0.3 × discount                    proposed discount as a fraction
//!   + 0.2 × (1.0 | 0.5)                 bought add-ons before or not
//! ```

use async_trait::async_trait;

use crate::error::BookingResult;
use crate::providers::{AcceptancePredictor, PredictionRequest};

const LOYALTY_WEIGHT: f64 = 0.3;
const GAP_WEIGHT: f64 = 0.2;
const DISCOUNT_WEIGHT: f64 = 0.3;
const HISTORY_WEIGHT: f64 = 0.2;

const LOYALTY_SATURATION: f64 = 10.0;
const GAP_SATURATION_MINUTES: f64 = 120.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPredictor;

impl HeuristicPredictor {
    pub fn score(request: &PredictionRequest) -> f64 {
        let history = request.history.unwrap_or_default();

        let loyalty = (history.customer_loyalty as f64 / LOYALTY_SATURATION).min(1.0);
        let gap = (request.gap_size_minutes as f64 / GAP_SATURATION_MINUTES).min(1.0);
        let discount = request.proposed_discount.fraction().clamp(0.0, 1.0);
        let past = if history.past_addon_history { 1.0 } else { 0.5 };

        (LOYALTY_WEIGHT * loyalty + GAP_WEIGHT * gap + DISCOUNT_WEIGHT * discount + HISTORY_WEIGHT * past)
            .clamp(0.0, 1.0)
    }
}

#[async_trait]
impl AcceptancePredictor for HeuristicPredictor {
    async fn predict(&self, request: &PredictionRequest) -> BookingResult<f64> {
        Ok(Self::score(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_core::types::DiscountRate;
    use aura_core::upsell::CustomerHistory;
    use chrono::Weekday;

    fn request(gap: u32, history: Option<CustomerHistory>) -> PredictionRequest {
        PredictionRequest {
            customer_id: "cust-1".into(),
            salon_id: "salon-1".into(),
            gap_size_minutes: gap,
            day_of_week: Weekday::Sat,
            proposed_discount: DiscountRate::from_percent(10),
            history,
        }
    }

    #[test]
    fn test_new_customer() {
        // 0 + 0.2 × 0.5 + 0.3 × 0.1 + 0.2 × 0.5
        let p = HeuristicPredictor::score(&request(60, None));
        assert!((p - 0.23).abs() < 1e-9);
    }

    #[test]
    fn test_loyal_customer_saturates() {
        let history = CustomerHistory {
            customer_loyalty: 25,
            past_addon_history: true,
        };
        // 0.3 + 0.2 + 0.03 + 0.2
        let p = HeuristicPredictor::score(&request(240, Some(history)));
        assert!((p - 0.73).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_predict_is_in_unit_range() {
        let p = HeuristicPredictor.predict(&request(90, None)).await.unwrap();
        assert!((0.0..=1.0).contains(&p));
    }
}
