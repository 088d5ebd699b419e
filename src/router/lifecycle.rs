//! Market lifecycle: exchange market setup, TwapMarket creation, closure.

use super::core::{require_expired, Router};
use super::results::{CloseOutcome, RouterError};
use crate::events::{EventPayload, MarketClosedEvent, TwapMarketCreatedEvent};
use crate::exchange::{Exchange, MarketParams};
use crate::ledger::LedgerError;
use crate::twap_market::{expiry_slot_for, twap_market_address, TwapMarket};
use crate::types::{Address, Lamports};
use tracing::info;

impl<E: Exchange + Clone> Router<E> {
    /// Creates the underlying exchange market, with its rent paid by `payer`.
    ///
    /// To be wrapped later the market must name the TwapMarket address (see
    /// [`Router::twap_market_address`]) as both its open-orders and close-market admin.
    pub fn create_exchange_market(
        &mut self,
        payer: &Address,
        market: Address,
        params: MarketParams,
    ) -> Result<Lamports, RouterError> {
        self.transact("create_exchange_market", |ctx, txn| {
            let rent = txn.exchange.create_market(market, params, &ctx.clock)?;
            txn.ledger.debit(payer, rent)?;
            Ok(rent)
        })
    }

    /// Creates the TwapMarket record for `market`, seeding the oracle with
    /// `expected_value`. Returns the record's address.
    pub fn create_twap_market(
        &mut self,
        payer: &Address,
        market: &Address,
        expected_value: u64,
        max_observation_change_per_update: u64,
    ) -> Result<Address, RouterError> {
        self.transact("create_twap_market", |ctx, txn| {
            let address = twap_market_address(market, &ctx.program_id);
            if txn.ledger.contains(&address) {
                return Err(RouterError::TwapMarketExists(address));
            }
            if max_observation_change_per_update == 0 {
                return Err(RouterError::InvalidParameter(
                    "max observation change per update must be positive".to_string(),
                ));
            }

            let info = txn.exchange.market_info(market)?;
            for (role, admin) in [
                ("open orders admin", info.params.open_orders_admin),
                ("close market admin", info.params.close_market_admin),
            ] {
                if admin != Some(address) {
                    return Err(RouterError::AdminMismatch {
                        role,
                        expected: address,
                        found: admin,
                    });
                }
            }

            let expiry_slot = expiry_slot_for(
                ctx.clock.slot,
                ctx.clock.unix_timestamp,
                info.params.time_expiry,
                ctx.config.slot_duration_ms,
            )
            .ok_or(RouterError::InvalidExpiry {
                time_expiry: info.params.time_expiry,
                now: ctx.clock.unix_timestamp,
            })?;

            let space = ctx.config.twap_market_space;
            let needed = TwapMarket::max_encoded_len()?;
            if space < needed {
                return Err(LedgerError::RecordTooLarge {
                    record: address,
                    needed,
                    space,
                }
                .into());
            }

            let record = TwapMarket::new(
                *market,
                expected_value,
                max_observation_change_per_update,
                info.params.close_market_rent_receiver,
                ctx.clock.slot,
                expiry_slot,
            );
            let rent = txn.ledger.create_record(
                &address,
                &ctx.program_id,
                payer,
                space,
                &record,
            )?;

            info!(
                twap_market = %address,
                %market,
                expected_value,
                max_observation_change_per_update,
                expiry_slot,
                "twap market created"
            );
            txn.events.push(EventPayload::TwapMarketCreated(TwapMarketCreatedEvent {
                twap_market: address,
                market: *market,
                expected_value,
                max_observation_change_per_update,
                expiry_slot,
                rent,
            }));
            Ok(address)
        })
    }

    /// Closes an expired market: the exchange rent goes to `rent_receiver`, which
    /// must be the receiver bound at creation, and the TwapMarket record's rent goes
    /// back to its payer.
    pub fn close_market(
        &mut self,
        twap_market: &Address,
        market: &Address,
        rent_receiver: &Address,
    ) -> Result<CloseOutcome, RouterError> {
        self.transact("close_market", |ctx, txn| {
            let record = txn.load(ctx, twap_market, market)?;
            require_expired(ctx, &record)?;
            if record.close_market_rent_receiver != *rent_receiver {
                return Err(RouterError::RentReceiverMismatch {
                    expected: record.close_market_rent_receiver,
                    found: *rent_receiver,
                });
            }

            let exchange_rent = txn
                .exchange
                .close_market(market, twap_market, rent_receiver, &ctx.clock)?;
            txn.ledger.credit(rent_receiver, exchange_rent)?;
            let closed = txn.ledger.close_record(twap_market, &ctx.program_id)?;

            info!(
                %market,
                %rent_receiver,
                exchange_rent,
                record_rent = closed.lamports,
                "market closed"
            );
            txn.events.push(EventPayload::MarketClosed(MarketClosedEvent {
                market: *market,
                rent_receiver: *rent_receiver,
                exchange_rent,
                record_rent: closed.lamports,
            }));
            Ok(CloseOutcome {
                exchange_rent,
                record_rent: closed.lamports,
                record_payer: closed.payer,
            })
        })
    }
}
