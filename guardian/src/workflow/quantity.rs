use rand::Rng;
use tracing::{info, warn};

/// Upper bound of a sampled quantity when stock is plentiful.
pub const MAX_SAMPLED_QUANTITY: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledQuantity {
    pub quantity: i64,
    /// Stock was below 1 and the floor was applied (a warning was logged).
    pub floored: bool,
}

/// Random item quantity for a product with `stock` available.
///
/// Stock is truncated to a whole number and defaults to 1 when unknown.
/// Stock below 1 is floored to 1 with a warning. The result is uniform over
/// `[1, 20]` when stock is at least 20, otherwise over `[1, stock]`.
pub fn sample_quantity<R: Rng + ?Sized>(
    rng: &mut R,
    product: &str,
    stock: Option<f64>,
) -> SampledQuantity {
    let mut available = stock.map(|s| s.trunc() as i64).unwrap_or(1);
    let floored = available < 1;
    if floored {
        warn!(
            "Stock for product {} is zero or negative. Using quantity 1.",
            product
        );
        available = 1;
    }

    let quantity = rng.gen_range(1..=available.min(MAX_SAMPLED_QUANTITY));
    info!(
        "Available stock: {}. Sampled quantity: {}",
        available, quantity
    );
    SampledQuantity { quantity, floored }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn non_positive_stock_is_floored_to_one() {
        let mut rng = StdRng::seed_from_u64(7);
        for stock in [0.0, -3.0, 0.4, -0.9] {
            let sampled = sample_quantity(&mut rng, "P1", Some(stock));
            assert_eq!(sampled.quantity, 1);
            assert!(sampled.floored, "{stock} should be floored");
        }
    }

    #[test]
    fn unknown_stock_defaults_to_one() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            sample_quantity(&mut rng, "P1", None),
            SampledQuantity {
                quantity: 1,
                floored: false
            }
        );
    }

    #[test]
    fn plentiful_stock_is_capped_at_twenty() {
        let mut rng = StdRng::seed_from_u64(42);
        for stock in [20.0, 21.0, 500.0, 1e6] {
            for _ in 0..200 {
                let q = sample_quantity(&mut rng, "P2", Some(stock)).quantity;
                assert!((1..=MAX_SAMPLED_QUANTITY).contains(&q), "{q} for {stock}");
            }
        }
    }

    #[test]
    fn scarce_stock_bounds_the_quantity() {
        let mut rng = StdRng::seed_from_u64(3);
        for stock in 1..20 {
            for _ in 0..100 {
                let q = sample_quantity(&mut rng, "P3", Some(stock as f64 + 0.7)).quantity;
                assert!((1..=stock).contains(&q), "{q} for {stock}");
            }
        }
    }
}
