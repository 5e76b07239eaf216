//! Preorder eligibility.
//!
//! The venue only accepts limit orders inside a collar around the market
//! price. A preorder is submitted only when its limit sits inside the collar
//! narrowed by [`COLLAR_MARGIN`] on each side, bounds inclusive.
//!
//! | action | collar      | eligible band   |
//! |--------|-------------|-----------------|
//! | BUY    | 0.80 - 1.10 | 0.825 - 1.075   |
//! | SELL   | 0.90 - 1.20 | 0.925 - 1.175   |

use preorder_core::{OrderAction, Preorder, PreorderStatus, Price};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

/// Venue collar as multiples of the market price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collar {
    pub lower: Decimal,
    pub upper: Decimal,
}

pub const BUY_COLLAR: Collar = Collar {
    lower: dec!(0.80),
    upper: dec!(1.10),
};

pub const SELL_COLLAR: Collar = Collar {
    lower: dec!(0.90),
    upper: dec!(1.20),
};

/// Buffer kept from each collar edge.
pub const COLLAR_MARGIN: Decimal = dec!(0.025);

/// Absolute price band a limit must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub lower: Price,
    pub upper: Price,
}

impl Band {
    pub fn contains(&self, limit: Price) -> bool {
        self.lower <= limit && limit <= self.upper
    }
}

/// Eligible band for `action` at `market`.
pub fn band(action: OrderAction, market: Price) -> Band {
    let collar = match action {
        OrderAction::Buy => BUY_COLLAR,
        OrderAction::Sell => SELL_COLLAR,
    };
    Band {
        lower: Price::new(market.inner() * (collar.lower + COLLAR_MARGIN)),
        upper: Price::new(market.inner() * (collar.upper - COLLAR_MARGIN)),
    }
}

/// Why a preorder was not submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ineligible {
    #[error("status is {0}")]
    NotPending(PreorderStatus),

    #[error("unsupported time in force {0}")]
    UnsupportedTimeInForce(String),

    #[error("limit {limit} outside [{}, {}]", .band.lower, .band.upper)]
    OutsideBand { limit: Price, band: Band },
}

/// Decide whether `preorder` may be submitted at `market`.
pub fn check_eligibility(preorder: &Preorder, market: Price) -> Result<(), Ineligible> {
    if preorder.status != PreorderStatus::Pending {
        return Err(Ineligible::NotPending(preorder.status));
    }
    if !preorder.time_in_force.is_supported() {
        return Err(Ineligible::UnsupportedTimeInForce(
            preorder.time_in_force.as_str().to_string(),
        ));
    }
    let band = band(preorder.action, market);
    if !band.contains(preorder.limit_price) {
        return Err(Ineligible::OutsideBand {
            limit: preorder.limit_price,
            band,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use preorder_core::TimeInForce;
    use proptest::prelude::*;

    fn preorder(action: OrderAction, limit: Decimal) -> Preorder {
        Preorder {
            symbol: "GME".to_string(),
            action,
            limit_price: Price::new(limit),
            size: 10,
            time_in_force: TimeInForce::GoodTillCanceled,
            product_id: "1147582".to_string(),
            status: PreorderStatus::Pending,
            order_created_utc: None,
            extra: Default::default(),
        }
    }

    fn market(p: Decimal) -> Price {
        Price::new(p)
    }

    #[test]
    fn test_sell_at_22_is_eligible_at_30_is_not() {
        let p = preorder(OrderAction::Sell, dec!(25.00));
        assert!(check_eligibility(&p, market(dec!(22.00))).is_ok());
        assert!(matches!(
            check_eligibility(&p, market(dec!(30.00))),
            Err(Ineligible::OutsideBand { .. })
        ));
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        // BUY at 100: [82.5, 107.5]
        let m = market(dec!(100));
        assert!(check_eligibility(&preorder(OrderAction::Buy, dec!(82.5)), m).is_ok());
        assert!(check_eligibility(&preorder(OrderAction::Buy, dec!(107.5)), m).is_ok());
        assert!(check_eligibility(&preorder(OrderAction::Buy, dec!(82.49)), m).is_err());
        assert!(check_eligibility(&preorder(OrderAction::Buy, dec!(107.51)), m).is_err());

        // SELL at 100: [92.5, 117.5]
        assert!(check_eligibility(&preorder(OrderAction::Sell, dec!(92.5)), m).is_ok());
        assert!(check_eligibility(&preorder(OrderAction::Sell, dec!(117.5)), m).is_ok());
        assert!(check_eligibility(&preorder(OrderAction::Sell, dec!(92.49)), m).is_err());
        assert!(check_eligibility(&preorder(OrderAction::Sell, dec!(117.51)), m).is_err());
    }

    #[test]
    fn test_terminal_status_is_ineligible() {
        let mut p = preorder(OrderAction::Sell, dec!(25));
        p.status = PreorderStatus::OrderCreated;
        assert_eq!(
            check_eligibility(&p, market(dec!(25))),
            Err(Ineligible::NotPending(PreorderStatus::OrderCreated))
        );
        p.status = PreorderStatus::Canceled;
        assert!(check_eligibility(&p, market(dec!(25))).is_err());
    }

    #[test]
    fn test_unsupported_time_in_force_is_ineligible() {
        let mut p = preorder(OrderAction::Buy, dec!(25));
        p.time_in_force = TimeInForce::Unsupported("FILL_OR_KILL".to_string());
        assert_eq!(
            check_eligibility(&p, market(dec!(25))),
            Err(Ineligible::UnsupportedTimeInForce("FILL_OR_KILL".to_string()))
        );
    }

    fn action() -> impl Strategy<Value = OrderAction> {
        prop_oneof![Just(OrderAction::Buy), Just(OrderAction::Sell)]
    }

    proptest! {
        #[test]
        fn prop_band_bounds_accepted_just_outside_rejected(
            cents in 1i64..100_000_000,
            action in action(),
        ) {
            let m = market(Decimal::new(cents, 2));
            let b = band(action, m);
            let step = dec!(0.000001);

            prop_assert!(check_eligibility(&preorder(action, b.lower.inner()), m).is_ok());
            prop_assert!(check_eligibility(&preorder(action, b.upper.inner()), m).is_ok());
            prop_assert!(check_eligibility(&preorder(action, b.lower.inner() - step), m).is_err());
            prop_assert!(check_eligibility(&preorder(action, b.upper.inner() + step), m).is_err());
        }

        #[test]
        fn prop_limit_at_market_is_eligible(cents in 1i64..100_000_000, action in action()) {
            let m = market(Decimal::new(cents, 2));
            prop_assert!(check_eligibility(&preorder(action, m.inner()), m).is_ok());
        }

        #[test]
        fn prop_band_is_ordered(cents in 1i64..100_000_000, action in action()) {
            let b = band(action, market(Decimal::new(cents, 2)));
            prop_assert!(b.lower < b.upper);
        }
    }
}
