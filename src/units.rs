// 12.0: lots to human units. display only, the oracle and the book never see a Decimal.
// a lot is `lot_size` native units and a native unit is 10^-decimals of a token.

use crate::exchange::MarketInfo;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("Lot size must be positive, got {0}")]
    InvalidLotSize(i64),

    #[error("Token decimals {0} out of range")]
    InvalidDecimals(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotConverter {
    // tokens per base lot and per quote lot
    base_lot: Decimal,
    quote_lot: Decimal,
}

impl LotConverter {
    pub fn new(
        base_lot_size: i64,
        quote_lot_size: i64,
        base_decimals: u32,
        quote_decimals: u32,
    ) -> Result<Self, UnitsError> {
        for lot_size in [base_lot_size, quote_lot_size] {
            if lot_size <= 0 {
                return Err(UnitsError::InvalidLotSize(lot_size));
            }
        }
        for decimals in [base_decimals, quote_decimals] {
            if decimals > 28 {
                return Err(UnitsError::InvalidDecimals(decimals));
            }
        }
        Ok(Self {
            base_lot: Decimal::new(base_lot_size, base_decimals),
            quote_lot: Decimal::new(quote_lot_size, quote_decimals),
        })
    }

    pub fn for_market(info: &MarketInfo, base_decimals: u32, quote_decimals: u32) -> Result<Self, UnitsError> {
        Self::new(
            info.params.base_lot_size,
            info.params.quote_lot_size,
            base_decimals,
            quote_decimals,
        )
    }

    /// Quote tokens per base token.
    pub fn price_to_ui(&self, price_lots: u64) -> Decimal {
        Decimal::from(price_lots) * self.quote_lot / self.base_lot
    }

    /// Price lots for a quote-per-base price, floored.
    pub fn price_from_ui(&self, price: Decimal) -> Option<i64> {
        let lots = price.checked_mul(self.base_lot)?.checked_div(self.quote_lot)?;
        lots.floor().to_i64()
    }

    pub fn base_lots_to_ui(&self, base_lots: i64) -> Decimal {
        Decimal::from(base_lots) * self.base_lot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // META (9 decimals) against USDC (6 decimals), one META per base lot, 0.0001 USDC per quote lot
    fn meta_usdc() -> LotConverter {
        LotConverter::new(1_000_000_000, 100, 9, 6).unwrap()
    }

    #[test]
    fn price_lots_to_ui() {
        let units = meta_usdc();
        assert_eq!(units.price_to_ui(500_000), dec!(50));
        assert_eq!(units.price_to_ui(495_000), dec!(49.5));
    }

    #[test]
    fn ui_to_price_lots_floors() {
        let units = meta_usdc();
        assert_eq!(units.price_from_ui(dec!(50)), Some(500_000));
        assert_eq!(units.price_from_ui(dec!(50.00015)), Some(500_001));
    }

    #[test]
    fn sizes() {
        let units = meta_usdc();
        assert_eq!(units.base_lots_to_ui(3), dec!(3));
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(LotConverter::new(0, 100, 9, 6), Err(UnitsError::InvalidLotSize(0)));
        assert_eq!(LotConverter::new(1, 100, 29, 6), Err(UnitsError::InvalidDecimals(29)));
    }
}
