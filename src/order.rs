//! Order types and the lot-denominated order book.
//!
//! Prices are quote lots per base lot and sizes are base lots, both `i64` as on the
//! exchange. Limit orders rest with price-time priority; take orders match
//! immediately and never rest.

use crate::types::{Address, OrderId, Side};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// How an order interacts with the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Match what crosses, rest the remainder.
    Limit,
    /// Match what crosses, drop the remainder.
    ImmediateOrCancel,
    /// Reject if any part would take liquidity.
    PostOnly,
    /// Match at any price, drop the remainder.
    Market,
    /// Match the full size or nothing.
    FillOrKill,
}

impl Default for OrderType {
    fn default() -> Self {
        Self::Limit
    }
}

/// What happens when a taker meets its own resting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelfTradeBehavior {
    /// Shrink both orders by the overlap without exchanging funds.
    DecrementTake,
    /// Cancel the resting order and keep matching.
    CancelProvide,
    /// Fail the whole placement.
    AbortTransaction,
}

impl Default for SelfTradeBehavior {
    fn default() -> Self {
        Self::DecrementTake
    }
}

/// Arguments of a resting-capable order placed through an open-orders account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderArgs {
    pub side: Side,
    pub price_lots: i64,
    pub max_base_lots: i64,
    pub max_quote_lots_including_fees: i64,
    pub client_order_id: u64,
    pub order_type: OrderType,
    /// Unix seconds after which the order is ignored. 0 means never.
    pub expiry_timestamp: u64,
    pub self_trade_behavior: SelfTradeBehavior,
    /// Maximum number of resting orders to match against.
    pub limit: u8,
}

impl PlaceOrderArgs {
    /// Plain limit order for `max_base_lots` at `price_lots`.
    pub fn limit(side: Side, price_lots: i64, max_base_lots: i64, client_order_id: u64) -> Self {
        Self {
            side,
            price_lots,
            max_base_lots,
            max_quote_lots_including_fees: price_lots.saturating_mul(max_base_lots),
            client_order_id,
            order_type: OrderType::Limit,
            expiry_timestamp: 0,
            self_trade_behavior: SelfTradeBehavior::DecrementTake,
            limit: u8::MAX,
        }
    }
}

/// Arguments of a take order: settles straight against the taker's wallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceTakeOrderArgs {
    pub side: Side,
    pub price_lots: i64,
    pub max_base_lots: i64,
    pub max_quote_lots_including_fees: i64,
    pub order_type: OrderType,
    pub limit: u8,
}

impl PlaceTakeOrderArgs {
    /// Zero-size immediate-or-cancel order. Touches nothing on the book but still
    /// runs a full routed operation, which is what advances the oracle.
    pub fn crank(side: Side, price_lots: i64) -> Self {
        Self {
            side,
            price_lots,
            max_base_lots: 0,
            max_quote_lots_including_fees: 0,
            order_type: OrderType::ImmediateOrCancel,
            limit: u8::MAX,
        }
    }

    pub fn market(side: Side, price_lots: i64, max_base_lots: i64) -> Self {
        Self {
            side,
            price_lots,
            max_base_lots,
            max_quote_lots_including_fees: price_lots.saturating_mul(max_base_lots),
            order_type: OrderType::Market,
            limit: u8::MAX,
        }
    }
}

/// An order resting on the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub id: OrderId,
    /// Open-orders account the order belongs to.
    pub owner: Address,
    pub client_order_id: u64,
    pub side: Side,
    pub price_lots: i64,
    pub base_lots: i64,
    /// Insertion sequence, the time half of price-time priority.
    pub seq: u64,
    pub expiry_timestamp: u64,
}

impl RestingOrder {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry_timestamp != 0 && now >= 0 && now as u64 >= self.expiry_timestamp
    }
}

// priority is -price for bids and +price for asks, so the first key is always best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    priority: i64,
    seq: u64,
}

impl OrderKey {
    fn new(side: Side, price_lots: i64, seq: u64) -> Self {
        let priority = match side {
            Side::Bid => -price_lots,
            Side::Ask => price_lots,
        };
        Self { priority, seq }
    }
}

/// Aggregated size at one price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price_lots: i64,
    pub base_lots: i64,
    pub order_count: usize,
}

/// Central limit order book for one market.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    bids: BTreeMap<OrderKey, RestingOrder>,
    asks: BTreeMap<OrderKey, RestingOrder>,
    index: HashMap<OrderId, (Side, OrderKey)>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best_bid(&self) -> Option<i64> {
        self.bids.values().next().map(|o| o.price_lots)
    }

    pub fn best_ask(&self) -> Option<i64> {
        self.asks.values().next().map(|o| o.price_lots)
    }

    pub fn insert(&mut self, order: RestingOrder) {
        let key = OrderKey::new(order.side, order.price_lots, order.seq);
        self.index.insert(order.id, (order.side, key));
        match order.side {
            Side::Bid => self.bids.insert(key, order),
            Side::Ask => self.asks.insert(key, order),
        };
    }

    pub fn remove(&mut self, order_id: OrderId) -> Option<RestingOrder> {
        let (side, key) = self.index.remove(&order_id)?;
        match side {
            Side::Bid => self.bids.remove(&key),
            Side::Ask => self.asks.remove(&key),
        }
    }

    /// Ids of every order owned by `owner`, best priority first, bids before asks.
    pub fn orders_for(&self, owner: &Address) -> Vec<OrderId> {
        self.bids
            .values()
            .chain(self.asks.values())
            .filter(|o| o.owner == *owner)
            .map(|o| o.id)
            .collect()
    }

    pub fn levels(&self, side: Side, max_levels: usize) -> Vec<PriceLevel> {
        let orders = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };

        let mut levels: Vec<PriceLevel> = Vec::new();
        for order in orders.values() {
            match levels.last_mut() {
                Some(level) if level.price_lots == order.price_lots => {
                    level.base_lots += order.base_lots;
                    level.order_count += 1;
                }
                _ => {
                    if levels.len() >= max_levels {
                        break;
                    }
                    levels.push(PriceLevel {
                        price_lots: order.price_lots,
                        base_lots: order.base_lots,
                        order_count: 1,
                    });
                }
            }
        }
        levels
    }

    pub fn order_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    fn best_key(&self, side: Side) -> Option<OrderKey> {
        match side {
            Side::Bid => self.bids.keys().next().copied(),
            Side::Ask => self.asks.keys().next().copied(),
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<OrderKey, RestingOrder> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }
}

/// Incoming order as the matcher sees it.
#[derive(Debug, Clone)]
pub struct TakerOrder {
    pub owner: Address,
    pub side: Side,
    /// Worst acceptable price. `None` matches at any price.
    pub limit_price_lots: Option<i64>,
    pub max_base_lots: i64,
    pub max_quote_lots: i64,
    pub match_limit: u8,
    pub self_trade_behavior: SelfTradeBehavior,
    /// Unix seconds, used to drop expired makers while walking the book.
    pub now: i64,
}

/// A trade between a resting maker and the incoming taker, at the maker's price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub maker_owner: Address,
    pub taker_owner: Address,
    pub price_lots: i64,
    pub base_lots: i64,
    pub taker_side: Side,
}

/// Resting size removed without a trade (self-trade or expiry). The owner's locked
/// funds for it must be returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub order_id: OrderId,
    pub owner: Address,
    pub side: Side,
    pub price_lots: i64,
    pub base_lots: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub fills: Vec<Fill>,
    pub releases: Vec<Release>,
    pub base_filled: i64,
    pub quote_filled: i64,
    /// Base lots the taker still wants after matching.
    pub remaining_base: i64,
    /// Quote budget the taker has left after matching.
    pub remaining_quote: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid price {0} lots")]
    InvalidPrice(i64),

    #[error("Invalid size: base {base_lots}, quote {quote_lots}")]
    InvalidSize { base_lots: i64, quote_lots: i64 },

    #[error("Order would trade against the owner's own order {0:?}")]
    SelfTrade(OrderId),

    #[error("Lot arithmetic overflowed")]
    Overflow,
}

pub fn quote_lots_for(price_lots: i64, base_lots: i64) -> Result<i64, OrderError> {
    price_lots.checked_mul(base_lots).ok_or(OrderError::Overflow)
}

/// Match an incoming order against the opposite side of the book.
pub fn match_order(book: &mut OrderBook, taker: &TakerOrder) -> Result<MatchResult, OrderError> {
    if taker.max_base_lots < 0 || taker.max_quote_lots < 0 {
        return Err(OrderError::InvalidSize {
            base_lots: taker.max_base_lots,
            quote_lots: taker.max_quote_lots,
        });
    }

    let maker_side = taker.side.opposite();
    let mut result = MatchResult {
        remaining_base: taker.max_base_lots,
        remaining_quote: taker.max_quote_lots,
        ..MatchResult::default()
    };
    let mut touched: u16 = 0;

    while result.remaining_base > 0 && touched < u16::from(taker.match_limit) {
        let Some(key) = book.best_key(maker_side) else {
            break;
        };
        let Some(maker) = book.side_mut(maker_side).get(&key).cloned() else {
            break;
        };

        let crosses = match (taker.side, taker.limit_price_lots) {
            (_, None) => true,
            (Side::Bid, Some(limit)) => limit >= maker.price_lots,
            (Side::Ask, Some(limit)) => limit <= maker.price_lots,
        };
        if !crosses {
            break;
        }
        touched += 1;

        if maker.is_expired(taker.now) {
            book.remove(maker.id);
            result.releases.push(release_of(&maker, maker.base_lots));
            continue;
        }

        let affordable = result.remaining_quote / maker.price_lots;
        let base = result.remaining_base.min(maker.base_lots).min(affordable);
        if base == 0 {
            break;
        }

        if maker.owner == taker.owner {
            match taker.self_trade_behavior {
                SelfTradeBehavior::AbortTransaction => return Err(OrderError::SelfTrade(maker.id)),
                SelfTradeBehavior::CancelProvide => {
                    book.remove(maker.id);
                    result.releases.push(release_of(&maker, maker.base_lots));
                    continue;
                }
                SelfTradeBehavior::DecrementTake => {
                    reduce_maker(book, &maker, base);
                    result.releases.push(release_of(&maker, base));
                    result.remaining_base -= base;
                    continue;
                }
            }
        }

        let quote = quote_lots_for(maker.price_lots, base)?;
        reduce_maker(book, &maker, base);

        result.fills.push(Fill {
            maker_order_id: maker.id,
            maker_owner: maker.owner,
            taker_owner: taker.owner,
            price_lots: maker.price_lots,
            base_lots: base,
            taker_side: taker.side,
        });
        result.base_filled = result.base_filled.checked_add(base).ok_or(OrderError::Overflow)?;
        result.quote_filled = result.quote_filled.checked_add(quote).ok_or(OrderError::Overflow)?;
        result.remaining_base -= base;
        result.remaining_quote -= quote;
    }

    Ok(result)
}

fn reduce_maker(book: &mut OrderBook, maker: &RestingOrder, base_lots: i64) {
    if base_lots >= maker.base_lots {
        book.remove(maker.id);
    } else if let Some((side, key)) = book.index.get(&maker.id).copied() {
        if let Some(order) = book.side_mut(side).get_mut(&key) {
            order.base_lots -= base_lots;
        }
    }
}

fn release_of(maker: &RestingOrder, base_lots: i64) -> Release {
    Release {
        order_id: maker.id,
        owner: maker.owner,
        side: maker.side,
        price_lots: maker.price_lots,
        base_lots,
    }
}
