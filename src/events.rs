// 11.0: every committed router operation produces an event. used for audit trails and
// for watching the oracle move. the EventPayload enum lists all event types.

use crate::oracle::SkipReason;
use crate::types::{Address, Lamports, OrderId, Side, Slot, UnixTimestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub slot: Slot,
    pub unix_timestamp: UnixTimestamp,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    // Lifecycle events
    TwapMarketCreated(TwapMarketCreatedEvent),
    OrdersPruned(OrdersPrunedEvent),
    FundsSettled(FundsSettledEvent),
    MarketClosed(MarketClosedEvent),

    // Trade events
    OrderRouted(OrderRoutedEvent),

    // Oracle events
    OracleUpdated(OracleUpdatedEvent),
    OracleSkipped(OracleSkippedEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapMarketCreatedEvent {
    pub twap_market: Address,
    pub market: Address,
    pub expected_value: u64,
    pub max_observation_change_per_update: u64,
    pub expiry_slot: Slot,
    pub rent: Lamports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutedOrderKind {
    Place,
    Take,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRoutedEvent {
    pub market: Address,
    pub kind: RoutedOrderKind,
    pub side: Side,
    pub price_lots: i64,
    pub base_filled: i64,
    pub quote_filled: i64,
    pub posted_base_lots: i64,
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleUpdatedEvent {
    pub market: Address,
    pub sample: u64,
    pub previous: u64,
    pub observation: u64,
    pub elapsed_slots: u64,
    pub clamped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleSkippedEvent {
    pub market: Address,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdersPrunedEvent {
    pub market: Address,
    pub open_orders: Address,
    pub cancelled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsSettledEvent {
    pub market: Address,
    pub open_orders: Address,
    pub base_native: u64,
    pub quote_native: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketClosedEvent {
    pub market: Address,
    pub rent_receiver: Address,
    pub exchange_rent: Lamports,
    pub record_rent: Lamports,
}

pub trait EventEmitter {
    fn emit(&mut self, slot: Slot, unix_timestamp: UnixTimestamp, payload: EventPayload);
}

// 11.1: bounded in-memory log, oldest events dropped first
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            capacity: capacity.max(1),
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventEmitter for EventLog {
    fn emit(&mut self, slot: Slot, unix_timestamp: UnixTimestamp, payload: EventPayload) {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.events.push(Event {
            id,
            slot,
            unix_timestamp,
            payload,
        });

        if self.events.len() > self.capacity {
            let drain_count = self.events.len() - self.capacity;
            self.events.drain(0..drain_count);
        }
    }
}
