// 8.0 router/core.rs: the router. owns the ledger, the exchange handle, the clock and
// the audit log. every operation runs against a staged copy of ledger + exchange and
// is committed only if it returns Ok.

use super::results::RouterError;
use crate::config::RouterConfig;
use crate::events::{EventEmitter, EventLog, EventPayload, OracleSkippedEvent, OracleUpdatedEvent};
use crate::exchange::Exchange;
use crate::ledger::Ledger;
use crate::oracle::OracleUpdate;
use crate::order::Fill;
use crate::sampler::PriceSampler;
use crate::twap_market::{twap_market_address, MarketPhase, TwapMarket};
use crate::types::{Address, Clock, Lamports};
use tracing::{debug, warn};

/** 8.1: main router struct. all state lives here */
#[derive(Debug)]
pub struct Router<E> {
    pub(super) config: RouterConfig,
    pub(super) program_id: Address,
    pub(super) sampler: PriceSampler,
    pub(super) ledger: Ledger,
    pub(super) exchange: E,
    pub(super) events: EventLog,
    pub(super) clock: Clock,
    // wall time advanced since the last whole slot
    pub(super) pending_slot_millis: u64,
}

/// Read-only inputs of one operation.
pub(super) struct Context<'a> {
    pub program_id: Address,
    pub config: &'a RouterConfig,
    pub sampler: PriceSampler,
    pub clock: Clock,
}

/// Staged state of one operation. Dropped on error.
pub(super) struct Txn<E> {
    pub ledger: Ledger,
    pub exchange: E,
    pub events: Vec<EventPayload>,
}

impl<E: Exchange + Clone> Router<E> {
    pub fn new(config: RouterConfig, exchange: E, clock: Clock) -> Self {
        Self {
            program_id: Address::from_seed(&config.program_name),
            sampler: PriceSampler::new(config.sample_policy),
            ledger: Ledger::new(config.rent.clone()),
            events: EventLog::new(config.max_events),
            exchange,
            clock,
            pending_slot_millis: 0,
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn program_id(&self) -> Address {
        self.program_id
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
        self.pending_slot_millis = 0;
    }

    pub fn advance_slots(&mut self, slots: u64) {
        self.clock.advance_slots(slots);
    }

    /// Moves wall time and slot height together at the configured slot duration.
    pub fn advance_seconds(&mut self, seconds: i64) {
        self.clock.advance_seconds(seconds);
        let millis = (seconds.max(0) as u64)
            .saturating_mul(1_000)
            .saturating_add(self.pending_slot_millis);
        let slot_ms = self.config.slot_duration_ms;
        self.clock.advance_slots(millis.checked_div(slot_ms).unwrap_or(0));
        self.pending_slot_millis = millis.checked_rem(slot_ms).unwrap_or(0);
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    /// Direct exchange access for setup that does not go through the router
    /// (wallet funding, open-orders creation, deposits).
    pub fn exchange_mut(&mut self) -> &mut E {
        &mut self.exchange
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn airdrop(&mut self, account: &Address, lamports: Lamports) {
        self.ledger.airdrop(account, lamports);
    }

    pub fn balance(&self, account: &Address) -> Lamports {
        self.ledger.balance(account)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn twap_market_address(&self, market: &Address) -> Address {
        twap_market_address(market, &self.program_id)
    }

    pub fn twap_market(&self, twap_market: &Address) -> Result<TwapMarket, RouterError> {
        if !self.ledger.contains(twap_market) {
            return Err(RouterError::TwapMarketNotFound(*twap_market));
        }
        Ok(self.ledger.load(twap_market, &self.program_id)?)
    }

    pub fn realized_twap(&self, twap_market: &Address) -> Result<Option<u64>, RouterError> {
        Ok(self.twap_market(twap_market)?.twap_oracle.realized_twap())
    }

    pub fn phase(&self, twap_market: &Address) -> Result<MarketPhase, RouterError> {
        Ok(self.twap_market(twap_market)?.phase(self.clock.slot))
    }

    /// Encoded record as stored on the ledger.
    pub fn record_bytes(&self, twap_market: &Address) -> Option<&[u8]> {
        self.ledger.record_bytes(twap_market)
    }

    /// Runs `operation` on staged copies and commits them only on success.
    pub(super) fn transact<T, F>(&mut self, name: &'static str, operation: F) -> Result<T, RouterError>
    where
        F: FnOnce(&Context<'_>, &mut Txn<E>) -> Result<T, RouterError>,
    {
        let ctx = Context {
            program_id: self.program_id,
            config: &self.config,
            sampler: self.sampler,
            clock: self.clock,
        };
        let mut txn = Txn {
            ledger: self.ledger.clone(),
            exchange: self.exchange.clone(),
            events: Vec::new(),
        };

        match operation(&ctx, &mut txn) {
            Ok(value) => {
                self.ledger = txn.ledger;
                self.exchange = txn.exchange;
                for payload in txn.events {
                    self.events
                        .emit(self.clock.slot, self.clock.unix_timestamp, payload);
                }
                Ok(value)
            }
            Err(error) => {
                warn!(operation = name, code = error.code().as_u32(), %error, "operation rejected");
                Err(error)
            }
        }
    }
}

impl<E: Exchange> Txn<E> {
    /// Loads a TwapMarket and checks it tracks `market`.
    pub fn load(&self, ctx: &Context<'_>, twap_market: &Address, market: &Address) -> Result<TwapMarket, RouterError> {
        if !self.ledger.contains(twap_market) {
            return Err(RouterError::TwapMarketNotFound(*twap_market));
        }
        let record: TwapMarket = self.ledger.load(twap_market, &ctx.program_id)?;
        if record.market != *market {
            return Err(RouterError::MarketMismatch {
                expected: record.market,
                found: *market,
            });
        }
        Ok(record)
    }

    // 8.2: re-sample after the trading effect, feed the oracle, persist the record.
    pub fn update_oracle(
        &mut self,
        ctx: &Context<'_>,
        twap_market: &Address,
        record: &mut TwapMarket,
        fills: &[Fill],
    ) -> Result<OracleUpdate, RouterError> {
        let snapshot = self.exchange.book_snapshot(&record.market)?;
        let sample = ctx.sampler.sample(&snapshot, fills);
        let update = record.update_oracle(sample.map(|s| s.price), ctx.clock.slot)?;

        match update {
            OracleUpdate::Applied {
                sample,
                previous,
                observation,
                elapsed_slots,
                clamped,
            } => {
                debug!(
                    market = %record.market,
                    sample,
                    previous,
                    observation,
                    elapsed_slots,
                    clamped,
                    "oracle updated"
                );
                self.events.push(EventPayload::OracleUpdated(OracleUpdatedEvent {
                    market: record.market,
                    sample,
                    previous,
                    observation,
                    elapsed_slots,
                    clamped,
                }));
            }
            OracleUpdate::Skipped(reason) => {
                debug!(market = %record.market, ?reason, "oracle update skipped");
                self.events.push(EventPayload::OracleSkipped(OracleSkippedEvent {
                    market: record.market,
                    reason,
                }));
            }
        }

        self.ledger.store(twap_market, &ctx.program_id, record)?;
        Ok(update)
    }
}

pub(super) fn require_live(ctx: &Context<'_>, record: &TwapMarket) -> Result<(), RouterError> {
    if record.is_expired(ctx.clock.slot) {
        return Err(RouterError::MarketExpired {
            expiry_slot: record.expiry_slot,
        });
    }
    Ok(())
}

pub(super) fn require_expired(ctx: &Context<'_>, record: &TwapMarket) -> Result<(), RouterError> {
    if !record.is_expired(ctx.clock.slot) {
        return Err(RouterError::MarketNotExpired {
            expiry_slot: record.expiry_slot,
        });
    }
    Ok(())
}
