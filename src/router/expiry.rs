//! Post-expiry unwinding. Neither path touches the oracle.

use super::core::{require_expired, Router};
use super::results::RouterError;
use crate::events::{EventPayload, FundsSettledEvent, OrdersPrunedEvent};
use crate::exchange::{Exchange, Settlement};
use crate::types::Address;
use tracing::info;

impl<E: Exchange + Clone> Router<E> {
    /// Cancels up to `limit` resting orders of `open_orders`. Returns how many went.
    pub fn prune_orders(
        &mut self,
        twap_market: &Address,
        market: &Address,
        open_orders: &Address,
        limit: u8,
    ) -> Result<usize, RouterError> {
        self.transact("prune_orders", |ctx, txn| {
            let record = txn.load(ctx, twap_market, market)?;
            require_expired(ctx, &record)?;

            let cancelled = txn
                .exchange
                .prune_orders(market, open_orders, twap_market, limit, &ctx.clock)?;
            info!(%market, %open_orders, cancelled, "orders pruned");
            txn.events.push(EventPayload::OrdersPruned(OrdersPrunedEvent {
                market: *market,
                open_orders: *open_orders,
                cancelled,
            }));
            Ok(cancelled)
        })
    }

    /// Returns every balance of `open_orders` to its owner's wallets.
    pub fn settle_funds_expired(
        &mut self,
        twap_market: &Address,
        market: &Address,
        open_orders: &Address,
    ) -> Result<Settlement, RouterError> {
        self.transact("settle_funds_expired", |ctx, txn| {
            let record = txn.load(ctx, twap_market, market)?;
            require_expired(ctx, &record)?;

            let settlement = txn
                .exchange
                .settle_funds_expired(market, open_orders, twap_market, &ctx.clock)?;
            info!(
                %market,
                %open_orders,
                base_native = settlement.base_native,
                quote_native = settlement.quote_native,
                "funds settled"
            );
            txn.events.push(EventPayload::FundsSettled(FundsSettledEvent {
                market: *market,
                open_orders: *open_orders,
                base_native: settlement.base_native,
                quote_native: settlement.quote_native,
            }));
            Ok(settlement)
        })
    }
}
