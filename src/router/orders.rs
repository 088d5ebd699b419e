//! Routed order placement. Both paths forward to the exchange with the TwapMarket
//! as open-orders admin, then crank the oracle from the post-trade book.

use super::core::{require_live, Router};
use super::results::{RoutedOrder, RouterError};
use crate::events::{EventPayload, OrderRoutedEvent, RoutedOrderKind};
use crate::exchange::{Exchange, TradeOutcome};
use crate::order::{PlaceOrderArgs, PlaceTakeOrderArgs};
use crate::types::{Address, Side};
use tracing::debug;

fn routed_event(market: &Address, kind: RoutedOrderKind, side: Side, price_lots: i64, outcome: &TradeOutcome) -> EventPayload {
    EventPayload::OrderRouted(OrderRoutedEvent {
        market: *market,
        kind,
        side,
        price_lots,
        base_filled: outcome.base_filled,
        quote_filled: outcome.quote_filled,
        posted_base_lots: outcome.posted_base_lots,
        order_id: outcome.order_id,
    })
}

impl<E: Exchange + Clone> Router<E> {
    /// Places an order through `open_orders`, which `signer` must own.
    pub fn place_order(
        &mut self,
        twap_market: &Address,
        market: &Address,
        open_orders: &Address,
        signer: &Address,
        args: &PlaceOrderArgs,
    ) -> Result<RoutedOrder, RouterError> {
        self.transact("place_order", |ctx, txn| {
            let mut record = txn.load(ctx, twap_market, market)?;
            require_live(ctx, &record)?;

            let outcome = txn
                .exchange
                .place_order(market, open_orders, signer, twap_market, args, &ctx.clock)?;
            debug!(
                %market,
                side = ?args.side,
                price_lots = args.price_lots,
                filled = outcome.base_filled,
                posted = outcome.posted_base_lots,
                "order routed"
            );
            txn.events.push(routed_event(
                market,
                RoutedOrderKind::Place,
                args.side,
                args.price_lots,
                &outcome,
            ));

            let oracle = txn.update_oracle(ctx, twap_market, &mut record, &outcome.fills)?;
            Ok(RoutedOrder { outcome, oracle })
        })
    }

    /// Places a take order settled against `taker`'s wallets. A zero-size take order
    /// is the crank: it trades nothing and only advances the oracle.
    pub fn place_take_order(
        &mut self,
        twap_market: &Address,
        market: &Address,
        taker: &Address,
        args: &PlaceTakeOrderArgs,
    ) -> Result<RoutedOrder, RouterError> {
        self.transact("place_take_order", |ctx, txn| {
            let mut record = txn.load(ctx, twap_market, market)?;
            require_live(ctx, &record)?;

            let outcome = txn
                .exchange
                .place_take_order(market, taker, twap_market, args, &ctx.clock)?;
            debug!(
                %market,
                side = ?args.side,
                price_lots = args.price_lots,
                filled = outcome.base_filled,
                "take order routed"
            );
            txn.events.push(routed_event(
                market,
                RoutedOrderKind::Take,
                args.side,
                args.price_lots,
                &outcome,
            ));

            let oracle = txn.update_oracle(ctx, twap_market, &mut record, &outcome.fills)?;
            Ok(RoutedOrder { outcome, oracle })
        })
    }
}
