//! TWAP router simulation.
//!
//! Runs the oracle lifecycle end to end against the in-memory exchange: seeding,
//! cranking, same-slot deferral, a manipulation attempt, expiry and closure.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use twap_router::*;

const NOW: i64 = 1_700_000_000;
const SOL: u64 = 1_000_000_000;
const EXPECTED_VALUE: u64 = 500_000;
const MAX_UPDATE_LOTS: u64 = 10_000;
const MARKET_LIFETIME_SECS: i64 = 10 * 24 * 60 * 60;
const BASE_DECIMALS: u32 = 9;
const QUOTE_DECIMALS: u32 = 6;

/// Clamped TWAP oracle simulator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML config file. Overrides --env.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preset: development, devnet or mainnet
    #[arg(short, long, default_value = "development")]
    env: String,

    /// Scenario to run: all, crank, same-slot, manipulation, lifecycle
    #[arg(short, long, default_value = "all")]
    scenario: String,

    /// Slots the manipulation scenario runs for
    #[arg(long, default_value_t = 20)]
    slots: u64,

    /// Ask price in USDC per META the attacker quotes in the manipulation scenario
    #[arg(long, default_value = "151")]
    attack_price: Decimal,
}

fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn load_config(args: &Args) -> Result<RouterConfig> {
    if let Some(path) = &args.config {
        return Ok(RouterConfig::load(path)?);
    }
    let env = match args.env.as_str() {
        "development" => Environment::Development,
        "devnet" => Environment::Devnet,
        "mainnet" => Environment::Mainnet,
        other => bail!("unknown environment {other}"),
    };
    Ok(env.config())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    config.validate()?;
    init_logging(&config.log_filter);

    info!(program = %config.program_name, slot_ms = config.slot_duration_ms, "twap-sim starting");
    println!("Clamped TWAP Oracle Simulation");
    println!("Seed {EXPECTED_VALUE} lots, max move {MAX_UPDATE_LOTS} lots per update\n");

    match args.scenario.as_str() {
        "all" => {
            scenario_1_crank(&config)?;
            scenario_2_same_slot(&config)?;
            scenario_3_manipulation(&config, args.slots, args.attack_price)?;
            scenario_4_lifecycle(&config)?;
        }
        "crank" => scenario_1_crank(&config)?,
        "same-slot" => scenario_2_same_slot(&config)?,
        "manipulation" => scenario_3_manipulation(&config, args.slots, args.attack_price)?,
        "lifecycle" => scenario_4_lifecycle(&config)?,
        other => bail!("unknown scenario {other}"),
    }

    println!("\nAll simulations completed successfully.");
    Ok(())
}

struct Sim {
    router: Router<InMemoryExchange>,
    units: LotConverter,
    payer: Address,
    market: Address,
    twap: Address,
    base_mint: Address,
    quote_mint: Address,
}

impl Sim {
    fn new(config: &RouterConfig) -> Result<Self> {
        let mut router = Router::new(config.clone(), InMemoryExchange::new(), Clock::new(1_000, NOW));
        let payer = Address::from_seed("payer");
        router.airdrop(&payer, 100 * SOL);

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
            time_expiry: NOW + MARKET_LIFETIME_SECS,
            open_orders_admin: Some(twap),
            consume_events_admin: None,
            close_market_admin: Some(twap),
            close_market_rent_receiver: payer,
        };
        router.create_exchange_market(&payer, market, params)?;
        router.create_twap_market(&payer, &market, EXPECTED_VALUE, MAX_UPDATE_LOTS)?;
        let info = router.exchange().market_info(&market)?;
        let units = LotConverter::for_market(&info, BASE_DECIMALS, QUOTE_DECIMALS)?;

        Ok(Self {
            router,
            units,
            payer,
            market,
            twap,
            base_mint,
            quote_mint,
        })
    }

    /// Funded trader with one open-orders account.
    fn trader(&mut self, name: &str) -> Result<(Address, Address)> {
        let owner = Address::from_seed(name);
        let exchange = self.router.exchange_mut();
        exchange.mint_to(&owner, &self.base_mint, 1_000 * 1_000_000_000);
        exchange.mint_to(&owner, &self.quote_mint, 1_000_000 * 1_000_000);
        let oo = exchange.create_open_orders(&self.market, &owner, "oo0")?;
        Ok((owner, oo))
    }

    fn limit(&mut self, owner: &Address, oo: &Address, side: Side, price_lots: i64) -> Result<RoutedOrder> {
        let args = PlaceOrderArgs::limit(side, price_lots, 1, price_lots as u64);
        Ok(self.router.place_order(&self.twap, &self.market, oo, owner, &args)?)
    }

    fn crank(&mut self) -> Result<RoutedOrder> {
        let cranker = Address::from_seed("cranker");
        let args = PlaceTakeOrderArgs::crank(Side::Bid, 540);
        Ok(self.router.place_take_order(&self.twap, &self.market, &cranker, &args)?)
    }

    fn observation(&self) -> Result<u64> {
        Ok(self.router.twap_market(&self.twap)?.twap_oracle.last_observation)
    }

    /// Prints the top levels of each side of the book.
    fn print_book(&self) {
        let Some(book) = self.router.exchange().book(&self.market) else {
            return;
        };
        for side in [Side::Ask, Side::Bid] {
            for level in book.levels(side, 3) {
                println!(
                    "    {side:?} {} x {} META ({} orders)",
                    self.units.price_to_ui(level.price_lots.unsigned_abs()),
                    self.units.base_lots_to_ui(level.base_lots),
                    level.order_count,
                );
            }
        }
    }

    fn report(&self, label: &str) -> Result<()> {
        let record = self.router.twap_market(&self.twap)?;
        let oracle = &record.twap_oracle;
        let twap = oracle
            .realized_twap()
            .map(|t| format!("{} (${})", t, self.units.price_to_ui(t)))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "  {label}: slot {}, observation {} (${}), twap {twap}, {} slots accumulated",
            self.router.clock().slot,
            oracle.last_observation,
            self.units.price_to_ui(oracle.last_observation),
            oracle.total_elapsed_slots,
        );
        Ok(())
    }
}

/// Two-sided book, one crank a slot later.
fn scenario_1_crank(config: &RouterConfig) -> Result<()> {
    println!("Scenario 1: Crank Against A Two-Sided Book\n");
    let mut sim = Sim::new(config)?;
    let (maker, oo) = sim.trader("maker")?;

    sim.limit(&maker, &oo, Side::Bid, 490_000)?;
    sim.limit(&maker, &oo, Side::Ask, 510_000)?;
    println!("  Maker quotes 490,000 / 510,000 lots");
    sim.print_book();
    sim.report("before crank")?;

    sim.router.advance_slots(1);
    let routed = sim.crank()?;
    println!("  Crank one slot later: {:?}", routed.oracle);
    sim.report("after crank")?;
    println!();
    Ok(())
}

/// Same-slot orders cannot move the oracle until a slot passes.
fn scenario_2_same_slot(config: &RouterConfig) -> Result<()> {
    println!("Scenario 2: Same-Slot Deferral\n");
    let mut sim = Sim::new(config)?;
    let (maker, oo) = sim.trader("maker")?;

    sim.limit(&maker, &oo, Side::Bid, 490_000)?;
    sim.limit(&maker, &oo, Side::Ask, 510_000)?;
    sim.router.advance_slots(1);
    sim.crank()?;

    let (other, other_oo) = sim.trader("second maker")?;
    let routed = sim.limit(&other, &other_oo, Side::Ask, 500_000)?;
    println!("  Ask 500,000 in the same slot: {:?}", routed.oracle);
    println!("  Observation still {}", sim.observation()?);

    sim.router.advance_slots(1);
    sim.crank()?;
    sim.report("next slot")?;
    println!();
    Ok(())
}

/// An attacker holds a far-off quote for many slots. Each update moves at most one step.
fn scenario_3_manipulation(config: &RouterConfig, slots: u64, attack_price: Decimal) -> Result<()> {
    println!("Scenario 3: Manipulation Attempt Over {slots} Slots\n");
    let mut sim = Sim::new(config)?;
    let (maker, oo) = sim.trader("maker")?;
    let (attacker, attacker_oo) = sim.trader("attacker")?;
    let attack_lots = sim
        .units
        .price_from_ui(attack_price)
        .filter(|lots| *lots > 0)
        .with_context(|| format!("attack price {attack_price} is not a valid price"))?;

    sim.limit(&maker, &oo, Side::Bid, 490_000)?;
    // the far ask drags the book midpoint toward the attack price
    sim.limit(&attacker, &attacker_oo, Side::Ask, attack_lots)?;
    sim.print_book();
    sim.router.advance_slots(1);
    sim.crank()?;
    sim.report("attack starts")?;

    for _ in 1..slots {
        sim.router.advance_slots(1);
        sim.crank()?;
    }
    sim.report("attack ends")?;
    println!(
        "  Worst case drift: {} lots over {} updates\n",
        sim.observation()?.saturating_sub(EXPECTED_VALUE),
        slots
    );
    Ok(())
}

/// Expiry, unwinding and rent recovery.
fn scenario_4_lifecycle(config: &RouterConfig) -> Result<()> {
    println!("Scenario 4: Expiry And Closure\n");
    let mut sim = Sim::new(config)?;
    let (maker, oo) = sim.trader("maker")?;
    sim.limit(&maker, &oo, Side::Bid, 490_000)?;
    sim.limit(&maker, &oo, Side::Ask, 510_000)?;

    match sim.router.prune_orders(&sim.twap, &sim.market, &oo, u8::MAX) {
        Err(e) => println!("  Prune before expiry rejected: {e} (code {})", e.code().as_u32()),
        Ok(_) => bail!("prune before expiry should fail"),
    }

    sim.router.advance_seconds(MARKET_LIFETIME_SECS + 24 * 60 * 60);
    println!("  Eleven days later, phase {:?}", sim.router.phase(&sim.twap)?);

    let pruned = sim.router.prune_orders(&sim.twap, &sim.market, &oo, u8::MAX)?;
    let settled = sim.router.settle_funds_expired(&sim.twap, &sim.market, &oo)?;
    println!(
        "  Pruned {pruned} orders, settled {} base / {} quote native",
        settled.base_native, settled.quote_native
    );

    let stranger = Address::from_seed("stranger");
    if let Err(e) = sim.router.close_market(&sim.twap, &sim.market, &stranger) {
        println!("  Close to the wrong receiver rejected: {e}");
    }

    let before = sim.router.balance(&sim.payer);
    let closed = sim.router.close_market(&sim.twap, &sim.market, &sim.payer)?;
    println!(
        "  Closed: receiver +{} lamports ({} exchange rent, {} record rent)",
        sim.router.balance(&sim.payer).saturating_sub(before),
        closed.exchange_rent,
        closed.record_rent
    );
    println!("  Events recorded: {}", sim.router.events().events().len());
    Ok(())
}
