// 4.0: price sampling. turns the book (or the trade that was just routed) into one
// candidate observation in quote lots per base lot. an empty side means no sample,
// never a zero price.

use crate::exchange::BookSnapshot;
use crate::order::Fill;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePolicy {
    /// Floor of the best bid / best ask midpoint.
    #[default]
    Midpoint,
    /// Volume-weighted price of the routed trade when it filled, midpoint otherwise.
    PreferTrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleSource {
    BookMidpoint,
    TradePrice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    pub price: u64,
    pub source: SampleSource,
}

/// Midpoint of the top of book. Non-positive quotes are not samples.
pub fn sample_book(snapshot: &BookSnapshot) -> Option<PriceSample> {
    let (bid, ask) = (snapshot.best_bid?, snapshot.best_ask?);
    if bid <= 0 || ask <= 0 {
        return None;
    }
    let bid = u64::try_from(bid).ok()?;
    let ask = u64::try_from(ask).ok()?;
    // (bid + ask) / 2 without the u64 add
    let mid = bid / 2 + ask / 2 + (bid % 2 + ask % 2) / 2;
    Some(PriceSample {
        price: mid,
        source: SampleSource::BookMidpoint,
    })
}

// 4.1: volume weighted fill price, floored. None when nothing traded.
pub fn sample_trade(fills: &[Fill]) -> Option<PriceSample> {
    let mut base: u128 = 0;
    let mut quote: u128 = 0;
    for fill in fills {
        let lots = u128::try_from(fill.base_lots).ok()?;
        let price = u128::try_from(fill.price_lots).ok()?;
        base = base.checked_add(lots)?;
        quote = quote.checked_add(price.checked_mul(lots)?)?;
    }
    if base == 0 {
        return None;
    }
    Some(PriceSample {
        price: u64::try_from(quote / base).ok()?,
        source: SampleSource::TradePrice,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceSampler {
    pub policy: SamplePolicy,
}

impl PriceSampler {
    pub fn new(policy: SamplePolicy) -> Self {
        Self { policy }
    }

    /// Sample taken after a routed operation: `fills` are the trades it produced.
    pub fn sample(&self, snapshot: &BookSnapshot, fills: &[Fill]) -> Option<PriceSample> {
        match self.policy {
            SamplePolicy::Midpoint => sample_book(snapshot),
            SamplePolicy::PreferTrade => sample_trade(fills).or_else(|| sample_book(snapshot)),
        }
    }
}
