//! End-to-end scenarios
//!
//! Drives the router against the in-memory exchange the way a keeper and market
//! makers would: seed, quote, crank, expire, unwind and close.

use twap_router::exchange::DEFAULT_MARKET_RENT;
use twap_router::*;

const NOW: i64 = 1_700_000_000;
const SOL: u64 = 1_000_000_000;
const EXPECTED_VALUE: u64 = 500_000;
const MAX_UPDATE_LOTS: u64 = 10_000;
const LIFETIME_SECS: i64 = 60 * 60;

struct Harness {
    router: Router<InMemoryExchange>,
    payer: Address,
    market: Address,
    twap: Address,
    base_mint: Address,
    quote_mint: Address,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    fn with_config(config: RouterConfig) -> Self {
        let mut router = Router::new(config, InMemoryExchange::new(), Clock::new(1_000, NOW));
        let payer = Address::from_seed("payer");
        router.airdrop(&payer, 10 * SOL);

        let market = Address::from_seed("META/USDC");
        let twap = router.twap_market_address(&market);
        let base_mint = Address::from_seed("META");
        let quote_mint = Address::from_seed("USDC");
        let params = MarketParams {
            name: "META/USDC".to_string(),
            base_mint,
            quote_mint,
            base_lot_size: 1_000_000_000,
            quote_lot_size: 100,
            time_expiry: NOW + LIFETIME_SECS,
            open_orders_admin: Some(twap),
            consume_events_admin: None,
            close_market_admin: Some(twap),
            close_market_rent_receiver: payer,
        };
        router.create_exchange_market(&payer, market, params).unwrap();
        router
            .create_twap_market(&payer, &market, EXPECTED_VALUE, MAX_UPDATE_LOTS)
            .unwrap();

        Self {
            router,
            payer,
            market,
            twap,
            base_mint,
            quote_mint,
        }
    }

    fn fund(&mut self, owner: &Address) {
        let exchange = self.router.exchange_mut();
        exchange.mint_to(owner, &self.base_mint, 100 * 1_000_000_000);
        exchange.mint_to(owner, &self.quote_mint, 1_000_000_000_000);
    }

    fn maker(&mut self, name: &str) -> (Address, Address) {
        let owner = Address::from_seed(name);
        self.fund(&owner);
        let oo = self
            .router
            .exchange_mut()
            .create_open_orders(&self.market, &owner, "oo")
            .unwrap();
        (owner, oo)
    }

    fn quote(&mut self, maker: &(Address, Address), side: Side, price_lots: i64) -> RoutedOrder {
        let args = PlaceOrderArgs::limit(side, price_lots, 1, price_lots as u64);
        self.router
            .place_order(&self.twap, &self.market, &maker.1, &maker.0, &args)
            .unwrap()
    }

    fn crank(&mut self) -> RoutedOrder {
        let cranker = Address::from_seed("cranker");
        self.router
            .place_take_order(&self.twap, &self.market, &cranker, &PlaceTakeOrderArgs::crank(Side::Bid, 540))
            .unwrap()
    }

    fn oracle(&self) -> TwapOracle {
        self.router.twap_market(&self.twap).unwrap().twap_oracle
    }

    fn bytes(&self) -> Vec<u8> {
        self.router.record_bytes(&self.twap).unwrap().to_vec()
    }
}

mod oracle_scenarios {
    use super::*;

    #[test]
    fn crank_one_slot_later_records_midpoint() {
        let mut h = Harness::new();
        let maker = h.maker("maker");

        let bid = h.quote(&maker, Side::Bid, 490_000);
        let ask = h.quote(&maker, Side::Ask, 510_000);
        // the lone bid leaves a one-sided book; the ask completes it in the creation slot
        assert_eq!(bid.oracle, OracleUpdate::Skipped(SkipReason::NoSample));
        assert_eq!(ask.oracle, OracleUpdate::Skipped(SkipReason::SameSlot));

        h.router.advance_slots(1);
        let routed = h.crank();
        assert!(routed.oracle.is_applied());

        let oracle = h.oracle();
        assert_eq!(oracle.last_observation, 500_000);
        assert_eq!(oracle.last_updated_slot, 1_001);
        assert_eq!(oracle.total_elapsed_slots, 1);
        assert_eq!(h.router.realized_twap(&h.twap).unwrap(), Some(500_000));
        assert_eq!(h.router.phase(&h.twap).unwrap(), MarketPhase::Active);
    }

    #[test]
    fn same_slot_quote_waits_for_next_slot() {
        let mut h = Harness::new();
        let maker = h.maker("maker");
        h.quote(&maker, Side::Bid, 490_000);
        h.quote(&maker, Side::Ask, 510_000);
        h.router.advance_slots(1);
        h.crank();
        let before = h.bytes();

        let second = h.maker("second maker");
        let routed = h.quote(&second, Side::Ask, 500_000);
        assert_eq!(routed.oracle, OracleUpdate::Skipped(SkipReason::SameSlot));
        assert_eq!(h.bytes(), before);

        h.router.advance_slots(1);
        h.crank();
        let oracle = h.oracle();
        assert_eq!(oracle.last_observation, 495_000);
        assert_eq!(oracle.total_elapsed_slots, 2);
        // the first slot held 500,000 and the second held 500,000 as well
        assert_eq!(oracle.realized_twap(), Some(500_000));
    }

    #[test]
    fn updates_without_liquidity_change_nothing() {
        let mut h = Harness::new();
        let before = h.bytes();

        h.router.advance_slots(3);
        assert_eq!(h.crank().oracle, OracleUpdate::Skipped(SkipReason::NoSample));
        h.router.advance_slots(3);
        assert_eq!(h.crank().oracle, OracleUpdate::Skipped(SkipReason::NoSample));

        assert_eq!(h.bytes(), before);
        assert_eq!(h.router.realized_twap(&h.twap).unwrap(), None);
    }

    #[test]
    fn one_sided_book_is_not_a_sample() {
        let mut h = Harness::new();
        let maker = h.maker("maker");
        h.quote(&maker, Side::Bid, 490_000);
        h.router.advance_slots(1);
        assert_eq!(h.crank().oracle, OracleUpdate::Skipped(SkipReason::NoSample));
        assert_eq!(h.oracle().last_updated_slot, 1_000);
    }

    #[test]
    fn far_quote_moves_observation_one_step() {
        let mut h = Harness::new();
        let maker = h.maker("maker");
        h.quote(&maker, Side::Bid, 490_000);
        h.quote(&maker, Side::Ask, 1_510_000);
        h.router.advance_slots(1);

        match h.crank().oracle {
            OracleUpdate::Applied {
                sample,
                observation,
                clamped,
                ..
            } => {
                assert_eq!(sample, 1_000_000);
                assert_eq!(observation, EXPECTED_VALUE + MAX_UPDATE_LOTS);
                assert!(clamped);
            }
            other => panic!("expected an applied update, got {other:?}"),
        }
    }

    #[test]
    fn prefer_trade_samples_the_fill_price() {
        let config = RouterConfig {
            sample_policy: SamplePolicy::PreferTrade,
            ..RouterConfig::default()
        };
        let mut h = Harness::with_config(config);
        let maker = h.maker("maker");
        h.quote(&maker, Side::Bid, 490_000);
        h.quote(&maker, Side::Ask, 505_000);
        h.router.advance_slots(1);

        let taker = Address::from_seed("taker");
        h.fund(&taker);
        let routed = h
            .router
            .place_take_order(&h.twap, &h.market, &taker, &PlaceTakeOrderArgs::market(Side::Bid, 505_000, 1))
            .unwrap();

        assert_eq!(routed.outcome.base_filled, 1);
        assert_eq!(h.oracle().last_observation, 505_000);
    }

    #[test]
    fn oracle_events_are_logged() {
        let mut h = Harness::new();
        let maker = h.maker("maker");
        h.quote(&maker, Side::Bid, 490_000);
        h.quote(&maker, Side::Ask, 510_000);
        h.router.advance_slots(1);
        h.crank();

        let events = h.router.events().events();
        assert!(events
            .iter()
            .any(|e| matches!(e.payload, EventPayload::OracleUpdated(_))));
        assert!(events
            .iter()
            .any(|e| matches!(e.payload, EventPayload::OracleSkipped(_))));
        assert_eq!(events.last().unwrap().slot, 1_001);
    }
}

mod access_scenarios {
    use super::*;

    #[test]
    fn exchange_rejects_orders_that_bypass_the_router() {
        let mut h = Harness::new();
        let (owner, oo) = h.maker("maker");
        let clock = h.router.clock();
        let args = PlaceOrderArgs::limit(Side::Bid, 490_000, 1, 1);

        let err = h
            .router
            .exchange_mut()
            .place_order(&h.market, &oo, &owner, &owner, &args, &clock)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Unauthorized { .. }));
    }

    #[test]
    fn twap_market_requires_router_admins() {
        let mut router = Router::new(RouterConfig::default(), InMemoryExchange::new(), Clock::new(1_000, NOW));
        let payer = Address::from_seed("payer");
        router.airdrop(&payer, 10 * SOL);
        let market = Address::from_seed("unguarded");
        let params = MarketParams {
            name: "UNGUARDED".to_string(),
            base_mint: Address::from_seed("META"),
            quote_mint: Address::from_seed("USDC"),
            base_lot_size: 1_000_000_000,
            quote_lot_size: 100,
            time_expiry: NOW + LIFETIME_SECS,
            open_orders_admin: None,
            consume_events_admin: None,
            close_market_admin: Some(router.twap_market_address(&market)),
            close_market_rent_receiver: payer,
        };
        router.create_exchange_market(&payer, market, params).unwrap();

        let err = router
            .create_twap_market(&payer, &market, EXPECTED_VALUE, MAX_UPDATE_LOTS)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authority);
        assert!(!router.ledger().contains(&router.twap_market_address(&market)));
    }
}

mod expiry_scenarios {
    use super::*;

    #[test]
    fn unwinding_waits_for_expiry() {
        let mut h = Harness::new();
        let maker = h.maker("maker");
        h.quote(&maker, Side::Bid, 490_000);

        let err = h
            .router
            .prune_orders(&h.twap, &h.market, &maker.1, u8::MAX)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Premature);
        let err = h
            .router
            .settle_funds_expired(&h.twap, &h.market, &maker.1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Premature);

        h.router.advance_seconds(LIFETIME_SECS);
        assert_eq!(h.router.prune_orders(&h.twap, &h.market, &maker.1, u8::MAX).unwrap(), 1);
        let settlement = h.router.settle_funds_expired(&h.twap, &h.market, &maker.1).unwrap();
        assert_eq!(settlement.quote_native, 490_000 * 100);
        assert!(h.router.exchange().open_orders(&maker.1).unwrap().is_empty());
    }

    #[test]
    fn close_pays_the_designated_receiver() {
        let mut h = Harness::new();
        let maker = h.maker("maker");
        h.quote(&maker, Side::Ask, 510_000);
        h.router.advance_seconds(LIFETIME_SECS);
        h.router.prune_orders(&h.twap, &h.market, &maker.1, u8::MAX).unwrap();
        h.router.settle_funds_expired(&h.twap, &h.market, &maker.1).unwrap();

        let stranger = Address::from_seed("stranger");
        let err = h.router.close_market(&h.twap, &h.market, &stranger).unwrap_err();
        assert!(matches!(err, RouterError::RentReceiverMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::Authority);
        assert!(h.router.ledger().contains(&h.twap));

        let account = h.router.ledger().record(&h.twap).unwrap();
        assert_eq!(account.owner_program, h.router.program_id());
        assert_eq!(account.space, h.router.config().twap_market_space);
        let record_lamports = account.lamports;

        let before = h.router.balance(&h.payer);
        let closed = h.router.close_market(&h.twap, &h.market, &h.payer).unwrap();
        let gained = h.router.balance(&h.payer) - before;

        assert!(gained >= DEFAULT_MARKET_RENT);
        assert_eq!(closed.record_rent, record_lamports);
        assert_eq!(gained, closed.exchange_rent + closed.record_rent);
        assert_eq!(closed.record_payer, h.payer);
        assert!(!h.router.ledger().contains(&h.twap));
        assert!(matches!(
            h.router.twap_market(&h.twap).unwrap_err(),
            RouterError::TwapMarketNotFound(_)
        ));
    }

    #[test]
    fn close_refuses_unsettled_market() {
        let mut h = Harness::new();
        let maker = h.maker("maker");
        h.quote(&maker, Side::Bid, 490_000);
        h.router.advance_seconds(LIFETIME_SECS);

        let err = h.router.close_market(&h.twap, &h.market, &h.payer).unwrap_err();
        assert_eq!(err, RouterError::Exchange(ExchangeError::MarketNotEmpty));
        assert!(h.router.ledger().contains(&h.twap));
    }

    #[test]
    fn close_before_expiry_is_premature() {
        let mut h = Harness::new();
        let err = h.router.close_market(&h.twap, &h.market, &h.payer).unwrap_err();
        assert!(matches!(err, RouterError::MarketNotExpired { .. }));
    }
}
