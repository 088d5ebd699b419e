// 3.2: in-process order book exchange. full Exchange implementation used by the
// simulator and the tests: lots-denominated book, open-orders balances, token wallets,
// vaults, expiry and admin checks.

use super::open_orders::{credit, debit, OpenOrdersAccount};
use super::{BookSnapshot, Exchange, ExchangeError, MarketInfo, MarketParams, Settlement, TradeOutcome};
use crate::order::{
    match_order, quote_lots_for, Fill, MatchResult, OrderBook, OrderError, OrderType, PlaceOrderArgs,
    PlaceTakeOrderArgs, Release, RestingOrder, TakerOrder,
};
use crate::types::{Address, Clock, Lamports, OrderId, Side};
use std::collections::HashMap;
use tracing::debug;

pub const EXCHANGE_PROGRAM_SEED: &str = "order_book_exchange";

/// Rent held by a market's book and event accounts until it is closed.
pub const DEFAULT_MARKET_RENT: Lamports = 2_500_000_000;

#[derive(Debug, Clone)]
struct MarketState {
    info: MarketInfo,
    book: OrderBook,
    base_vault: u64,
    quote_vault: u64,
    next_seq: u64,
}

#[derive(Debug, Clone)]
pub struct InMemoryExchange {
    program_id: Address,
    markets: HashMap<Address, MarketState>,
    open_orders: HashMap<Address, OpenOrdersAccount>,
    /// (owner, mint) -> native balance
    wallets: HashMap<(Address, Address), u64>,
    next_order_id: u64,
}

impl Default for InMemoryExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryExchange {
    pub fn new() -> Self {
        Self {
            program_id: Address::from_seed(EXCHANGE_PROGRAM_SEED),
            markets: HashMap::new(),
            open_orders: HashMap::new(),
            wallets: HashMap::new(),
            next_order_id: 1,
        }
    }

    pub fn program_id(&self) -> Address {
        self.program_id
    }

    pub fn mint_to(&mut self, owner: &Address, mint: &Address, amount: u64) {
        let balance = self.wallets.entry((*owner, *mint)).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn wallet_balance(&self, owner: &Address, mint: &Address) -> u64 {
        self.wallets.get(&(*owner, *mint)).copied().unwrap_or(0)
    }

    pub fn open_orders(&self, address: &Address) -> Option<&OpenOrdersAccount> {
        self.open_orders.get(address)
    }

    /// Open-orders accounts of a market, ordered by name.
    pub fn open_orders_for(&self, market: &Address) -> Vec<&OpenOrdersAccount> {
        let mut accounts: Vec<&OpenOrdersAccount> =
            self.open_orders.values().filter(|oo| oo.market == *market).collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name).then(a.address.cmp(&b.address)));
        accounts
    }

    pub fn book(&self, market: &Address) -> Option<&OrderBook> {
        self.markets.get(market).map(|m| &m.book)
    }

    /// (base, quote) native amounts held by the market's vaults.
    pub fn vault_balances(&self, market: &Address) -> Option<(u64, u64)> {
        self.markets.get(market).map(|m| (m.base_vault, m.quote_vault))
    }

    fn state(&self, market: &Address) -> Result<&MarketState, ExchangeError> {
        self.markets.get(market).ok_or(ExchangeError::MarketNotFound(*market))
    }

    fn account(&self, open_orders: &Address, market: &Address) -> Result<&OpenOrdersAccount, ExchangeError> {
        let oo = self
            .open_orders
            .get(open_orders)
            .ok_or(ExchangeError::OpenOrdersNotFound(*open_orders))?;
        if oo.market != *market {
            return Err(ExchangeError::OpenOrdersMarketMismatch {
                open_orders: *open_orders,
                expected: oo.market,
                found: *market,
            });
        }
        Ok(oo)
    }

    fn allocate_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    /// Pays every maker for its side of the fills and returns released funds.
    fn settle_makers(&mut self, info: &MarketInfo, result: &MatchResult) -> Result<(), ExchangeError> {
        for fill in &result.fills {
            settle_maker(&mut self.open_orders, info, fill)?;
        }
        for release in &result.releases {
            release_funds(&mut self.open_orders, info, release)?;
        }
        Ok(())
    }
}

fn check_admin(role: &'static str, expected: Option<Address>, found: &Address) -> Result<(), ExchangeError> {
    match expected {
        Some(admin) if admin != *found => Err(ExchangeError::Unauthorized {
            role,
            expected,
            found: *found,
        }),
        _ => Ok(()),
    }
}

fn require_admin(role: &'static str, expected: Option<Address>, found: &Address) -> Result<(), ExchangeError> {
    match expected {
        Some(admin) if admin == *found => Ok(()),
        _ => Err(ExchangeError::Unauthorized {
            role,
            expected,
            found: *found,
        }),
    }
}

fn validate_order(price_lots: i64, max_base_lots: i64, max_quote_lots: i64) -> Result<(), OrderError> {
    if price_lots <= 0 {
        return Err(OrderError::InvalidPrice(price_lots));
    }
    if max_base_lots < 0 || max_quote_lots < 0 {
        return Err(OrderError::InvalidSize {
            base_lots: max_base_lots,
            quote_lots: max_quote_lots,
        });
    }
    Ok(())
}

fn settle_maker(
    accounts: &mut HashMap<Address, OpenOrdersAccount>,
    info: &MarketInfo,
    fill: &Fill,
) -> Result<(), ExchangeError> {
    let maker = accounts
        .get_mut(&fill.maker_owner)
        .ok_or(ExchangeError::OpenOrdersNotFound(fill.maker_owner))?;
    let base = info.base_native(fill.base_lots)?;
    let quote = info.quote_native(quote_lots_for(fill.price_lots, fill.base_lots)?)?;

    match fill.taker_side.opposite() {
        Side::Bid => {
            maker.quote_locked = debit(maker.quote_locked, quote)?;
            maker.base_free = credit(maker.base_free, base)?;
        }
        Side::Ask => {
            maker.base_locked = debit(maker.base_locked, base)?;
            maker.quote_free = credit(maker.quote_free, quote)?;
        }
    }
    Ok(())
}

fn release_funds(
    accounts: &mut HashMap<Address, OpenOrdersAccount>,
    info: &MarketInfo,
    release: &Release,
) -> Result<(), ExchangeError> {
    let owner = accounts
        .get_mut(&release.owner)
        .ok_or(ExchangeError::OpenOrdersNotFound(release.owner))?;
    match release.side {
        Side::Bid => owner.unlock_quote(info.quote_native(quote_lots_for(release.price_lots, release.base_lots)?)?),
        Side::Ask => owner.unlock_base(info.base_native(release.base_lots)?),
    }
}

impl Exchange for InMemoryExchange {
    fn create_market(
        &mut self,
        market: Address,
        params: MarketParams,
        clock: &Clock,
    ) -> Result<Lamports, ExchangeError> {
        if self.markets.contains_key(&market) {
            return Err(ExchangeError::MarketAlreadyExists(market));
        }
        if params.base_lot_size <= 0 || params.quote_lot_size <= 0 {
            return Err(ExchangeError::InvalidMarketParams("lot sizes must be positive".to_string()));
        }
        if params.time_expiry != 0 && params.time_expiry <= clock.unix_timestamp {
            return Err(ExchangeError::InvalidMarketParams("expiry must be in the future".to_string()));
        }

        debug!(%market, name = %params.name, "exchange market created");
        let info = MarketInfo {
            address: market,
            params,
            rent_lamports: DEFAULT_MARKET_RENT,
            created_at: clock.unix_timestamp,
        };
        self.markets.insert(
            market,
            MarketState {
                info,
                book: OrderBook::new(),
                base_vault: 0,
                quote_vault: 0,
                next_seq: 0,
            },
        );
        Ok(DEFAULT_MARKET_RENT)
    }

    fn market_info(&self, market: &Address) -> Result<MarketInfo, ExchangeError> {
        Ok(self.state(market)?.info.clone())
    }

    fn book_snapshot(&self, market: &Address) -> Result<BookSnapshot, ExchangeError> {
        let book = &self.state(market)?.book;
        Ok(BookSnapshot {
            best_bid: book.best_bid(),
            best_ask: book.best_ask(),
        })
    }

    fn create_open_orders(
        &mut self,
        market: &Address,
        owner: &Address,
        name: &str,
    ) -> Result<Address, ExchangeError> {
        self.state(market)?;
        let address = Address::derive(
            &[b"OpenOrders", owner.as_bytes(), market.as_bytes(), name.as_bytes()],
            &self.program_id,
        );
        if self.open_orders.contains_key(&address) {
            return Err(ExchangeError::OpenOrdersAlreadyExists(address));
        }
        self.open_orders
            .insert(address, OpenOrdersAccount::new(address, *owner, *market, name));
        Ok(address)
    }

    fn deposit(
        &mut self,
        open_orders: &Address,
        base_native: u64,
        quote_native: u64,
    ) -> Result<(), ExchangeError> {
        let oo = self
            .open_orders
            .get(open_orders)
            .ok_or(ExchangeError::OpenOrdersNotFound(*open_orders))?;
        let (owner, market) = (oo.owner, oo.market);
        let params = self.state(&market)?.info.params.clone();

        let base_wallet = debit(self.wallet_balance(&owner, &params.base_mint), base_native)?;
        let quote_wallet = debit(self.wallet_balance(&owner, &params.quote_mint), quote_native)?;

        self.wallets.insert((owner, params.base_mint), base_wallet);
        self.wallets.insert((owner, params.quote_mint), quote_wallet);
        if let Some(oo) = self.open_orders.get_mut(open_orders) {
            oo.base_free = credit(oo.base_free, base_native)?;
            oo.quote_free = credit(oo.quote_free, quote_native)?;
        }
        if let Some(state) = self.markets.get_mut(&market) {
            state.base_vault = credit(state.base_vault, base_native)?;
            state.quote_vault = credit(state.quote_vault, quote_native)?;
        }
        Ok(())
    }

    fn place_order(
        &mut self,
        market: &Address,
        open_orders: &Address,
        signer: &Address,
        admin: &Address,
        args: &PlaceOrderArgs,
        clock: &Clock,
    ) -> Result<TradeOutcome, ExchangeError> {
        let state = self.state(market)?;
        let info = state.info.clone();
        if info.is_expired(clock.unix_timestamp) {
            return Err(ExchangeError::MarketExpired);
        }
        check_admin("open orders admin", info.params.open_orders_admin, admin)?;

        let oo = self.account(open_orders, market)?;
        if oo.owner != *signer {
            return Err(ExchangeError::Unauthorized {
                role: "open orders owner",
                expected: Some(oo.owner),
                found: *signer,
            });
        }
        let owner = oo.owner;
        validate_order(args.price_lots, args.max_base_lots, args.max_quote_lots_including_fees)?;

        let mut book = state.book.clone();
        if args.order_type == OrderType::PostOnly {
            let crosses = match args.side {
                Side::Bid => book.best_ask().is_some_and(|ask| args.price_lots >= ask),
                Side::Ask => book.best_bid().is_some_and(|bid| args.price_lots <= bid),
            };
            if crosses {
                return Err(ExchangeError::WouldTakeLiquidity);
            }
        }

        let max_quote_lots = match args.side {
            Side::Bid => args
                .max_quote_lots_including_fees
                .min(quote_lots_for(args.price_lots, args.max_base_lots)?),
            Side::Ask => args.max_quote_lots_including_fees,
        };
        let taker = TakerOrder {
            owner: *open_orders,
            side: args.side,
            limit_price_lots: (args.order_type != OrderType::Market).then_some(args.price_lots),
            max_base_lots: if args.order_type == OrderType::PostOnly { 0 } else { args.max_base_lots },
            max_quote_lots,
            match_limit: args.limit,
            self_trade_behavior: args.self_trade_behavior,
            now: clock.unix_timestamp,
        };
        let result = match_order(&mut book, &taker)?;

        if args.order_type == OrderType::FillOrKill && result.base_filled < args.max_base_lots {
            return Err(ExchangeError::WouldNotFill);
        }

        let mut rest_base = match args.order_type {
            OrderType::Limit => result.remaining_base,
            OrderType::PostOnly => args.max_base_lots,
            _ => 0,
        };
        if args.side == Side::Bid {
            let quote_left = if args.order_type == OrderType::PostOnly {
                max_quote_lots
            } else {
                result.remaining_quote
            };
            rest_base = rest_base.min(quote_left / args.price_lots);
        }

        // funds the taker side must have free: what it pays in fills plus what it rests
        let (needed, mint) = match args.side {
            Side::Bid => {
                let rest_quote = quote_lots_for(args.price_lots, rest_base)?;
                let lots = result.quote_filled.checked_add(rest_quote).ok_or(ExchangeError::Overflow)?;
                (info.quote_native(lots)?, info.params.quote_mint)
            }
            Side::Ask => {
                let lots = result.base_filled.checked_add(rest_base).ok_or(ExchangeError::Overflow)?;
                (info.base_native(lots)?, info.params.base_mint)
            }
        };
        let free = match args.side {
            Side::Bid => oo.quote_free,
            Side::Ask => oo.base_free,
        };
        let shortfall = needed.saturating_sub(free);
        let wallet = self.wallet_balance(&owner, &mint);
        if shortfall > wallet {
            return Err(ExchangeError::InsufficientFunds {
                needed,
                available: free.saturating_add(wallet),
            });
        }

        // everything below only moves funds that were checked above
        let base_filled = info.base_native(result.base_filled)?;
        let quote_filled = info.quote_native(result.quote_filled)?;
        self.wallets.insert((owner, mint), wallet - shortfall);

        let order_id = if rest_base > 0 {
            Some(self.allocate_order_id())
        } else {
            None
        };
        let state = self
            .markets
            .get_mut(market)
            .ok_or(ExchangeError::MarketNotFound(*market))?;
        let seq = state.next_seq;
        state.next_seq += 1;
        match args.side {
            Side::Bid => state.quote_vault = credit(state.quote_vault, shortfall)?,
            Side::Ask => state.base_vault = credit(state.base_vault, shortfall)?,
        }

        let oo = self
            .open_orders
            .get_mut(open_orders)
            .ok_or(ExchangeError::OpenOrdersNotFound(*open_orders))?;
        match args.side {
            Side::Bid => {
                oo.quote_free = credit(oo.quote_free, shortfall)?;
                oo.quote_free = debit(oo.quote_free, quote_filled)?;
                oo.base_free = credit(oo.base_free, base_filled)?;
            }
            Side::Ask => {
                oo.base_free = credit(oo.base_free, shortfall)?;
                oo.base_free = debit(oo.base_free, base_filled)?;
                oo.quote_free = credit(oo.quote_free, quote_filled)?;
            }
        }

        if let Some(id) = order_id {
            match args.side {
                Side::Bid => oo.lock_quote(info.quote_native(quote_lots_for(args.price_lots, rest_base)?)?)?,
                Side::Ask => oo.lock_base(info.base_native(rest_base)?)?,
            }
            book.insert(RestingOrder {
                id,
                owner: *open_orders,
                client_order_id: args.client_order_id,
                side: args.side,
                price_lots: args.price_lots,
                base_lots: rest_base,
                seq,
                expiry_timestamp: args.expiry_timestamp,
            });
        }

        self.settle_makers(&info, &result)?;
        if let Some(state) = self.markets.get_mut(market) {
            state.book = book;
        }

        debug!(
            %market,
            side = ?args.side,
            price_lots = args.price_lots,
            filled = result.base_filled,
            posted = rest_base,
            "order placed"
        );
        Ok(TradeOutcome {
            order_id,
            fills: result.fills,
            base_filled: result.base_filled,
            quote_filled: result.quote_filled,
            posted_base_lots: rest_base,
        })
    }

    fn place_take_order(
        &mut self,
        market: &Address,
        taker: &Address,
        admin: &Address,
        args: &PlaceTakeOrderArgs,
        clock: &Clock,
    ) -> Result<TradeOutcome, ExchangeError> {
        let state = self.state(market)?;
        let info = state.info.clone();
        if info.is_expired(clock.unix_timestamp) {
            return Err(ExchangeError::MarketExpired);
        }
        check_admin("open orders admin", info.params.open_orders_admin, admin)?;
        validate_order(args.price_lots, args.max_base_lots, args.max_quote_lots_including_fees)?;
        if args.order_type == OrderType::PostOnly {
            return Err(ExchangeError::WouldTakeLiquidity);
        }

        let mut book = state.book.clone();
        let order = TakerOrder {
            owner: *taker,
            side: args.side,
            limit_price_lots: (args.order_type != OrderType::Market).then_some(args.price_lots),
            max_base_lots: args.max_base_lots,
            max_quote_lots: args.max_quote_lots_including_fees,
            match_limit: args.limit,
            self_trade_behavior: Default::default(),
            now: clock.unix_timestamp,
        };
        let result = match_order(&mut book, &order)?;
        if args.order_type == OrderType::FillOrKill && result.base_filled < args.max_base_lots {
            return Err(ExchangeError::WouldNotFill);
        }

        let base = info.base_native(result.base_filled)?;
        let quote = info.quote_native(result.quote_filled)?;
        let (pay_mint, pay, receive_mint, receive) = match args.side {
            Side::Bid => (info.params.quote_mint, quote, info.params.base_mint, base),
            Side::Ask => (info.params.base_mint, base, info.params.quote_mint, quote),
        };
        let paid = debit(self.wallet_balance(taker, &pay_mint), pay)?;

        let state = self
            .markets
            .get_mut(market)
            .ok_or(ExchangeError::MarketNotFound(*market))?;
        match args.side {
            Side::Bid => {
                state.quote_vault = credit(state.quote_vault, quote)?;
                state.base_vault = debit(state.base_vault, base)?;
            }
            Side::Ask => {
                state.base_vault = credit(state.base_vault, base)?;
                state.quote_vault = debit(state.quote_vault, quote)?;
            }
        }
        self.wallets.insert((*taker, pay_mint), paid);
        let received = credit(self.wallet_balance(taker, &receive_mint), receive)?;
        self.wallets.insert((*taker, receive_mint), received);

        self.settle_makers(&info, &result)?;
        if let Some(state) = self.markets.get_mut(market) {
            state.book = book;
        }

        debug!(%market, side = ?args.side, filled = result.base_filled, "take order matched");
        Ok(TradeOutcome {
            order_id: None,
            fills: result.fills,
            base_filled: result.base_filled,
            quote_filled: result.quote_filled,
            posted_base_lots: 0,
        })
    }

    fn prune_orders(
        &mut self,
        market: &Address,
        open_orders: &Address,
        authority: &Address,
        limit: u8,
        clock: &Clock,
    ) -> Result<usize, ExchangeError> {
        let state = self.state(market)?;
        let info = state.info.clone();
        require_admin("close market admin", info.params.close_market_admin, authority)?;
        if !info.is_expired(clock.unix_timestamp) {
            return Err(ExchangeError::MarketNotExpired);
        }
        self.account(open_orders, market)?;

        let mut book = state.book.clone();
        let ids: Vec<OrderId> = book
            .orders_for(open_orders)
            .into_iter()
            .take(usize::from(limit))
            .collect();
        for id in &ids {
            if let Some(order) = book.remove(*id) {
                release_funds(
                    &mut self.open_orders,
                    &info,
                    &Release {
                        order_id: order.id,
                        owner: order.owner,
                        side: order.side,
                        price_lots: order.price_lots,
                        base_lots: order.base_lots,
                    },
                )?;
            }
        }
        if let Some(state) = self.markets.get_mut(market) {
            state.book = book;
        }
        Ok(ids.len())
    }

    fn settle_funds_expired(
        &mut self,
        market: &Address,
        open_orders: &Address,
        authority: &Address,
        clock: &Clock,
    ) -> Result<Settlement, ExchangeError> {
        let info = self.state(market)?.info.clone();
        require_admin("close market admin", info.params.close_market_admin, authority)?;
        if !info.is_expired(clock.unix_timestamp) {
            return Err(ExchangeError::MarketNotExpired);
        }
        let owner = self.account(open_orders, market)?.owner;

        // anything still resting is cancelled first so locked funds become free
        while self.prune_orders(market, open_orders, authority, u8::MAX, clock)? > 0 {}

        let oo = self
            .open_orders
            .get_mut(open_orders)
            .ok_or(ExchangeError::OpenOrdersNotFound(*open_orders))?;
        let (base_native, quote_native) = oo.withdraw_free();

        let state = self
            .markets
            .get_mut(market)
            .ok_or(ExchangeError::MarketNotFound(*market))?;
        state.base_vault = debit(state.base_vault, base_native)?;
        state.quote_vault = debit(state.quote_vault, quote_native)?;
        self.mint_to(&owner, &info.params.base_mint, base_native);
        self.mint_to(&owner, &info.params.quote_mint, quote_native);

        Ok(Settlement {
            base_native,
            quote_native,
        })
    }

    fn close_market(
        &mut self,
        market: &Address,
        authority: &Address,
        rent_receiver: &Address,
        clock: &Clock,
    ) -> Result<Lamports, ExchangeError> {
        let state = self.state(market)?;
        let params = &state.info.params;
        require_admin("close market admin", params.close_market_admin, authority)?;
        if params.close_market_rent_receiver != *rent_receiver {
            return Err(ExchangeError::Unauthorized {
                role: "close market rent receiver",
                expected: Some(params.close_market_rent_receiver),
                found: *rent_receiver,
            });
        }
        if params.time_expiry != 0 && !state.info.is_expired(clock.unix_timestamp) {
            return Err(ExchangeError::MarketNotExpired);
        }
        let unsettled = self.open_orders_for(market).iter().any(|oo| !oo.is_empty());
        if !state.book.is_empty() || unsettled {
            return Err(ExchangeError::MarketNotEmpty);
        }

        let rent = state.info.rent_lamports;
        self.markets.remove(market);
        self.open_orders.retain(|_, oo| oo.market != *market);
        debug!(%market, rent, "exchange market closed");
        Ok(rent)
    }
}
