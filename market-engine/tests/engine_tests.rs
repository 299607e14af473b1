//! End-to-end tests driving the full engine surface: wallet funding,
//! market lifecycle, staking, settlement and listing.

use chrono::{Duration, Utc};
use market_engine::{
    BetType, BettingEngine, Config, Error, MarketFilter, MarketStatus, Outcome,
};
use rust_decimal::Decimal;
use tempfile::TempDir;
use wallet_ledger::{AccountId, Currency};

fn engine() -> (BettingEngine, TempDir) {
    let temp = TempDir::new().unwrap();
    let config = Config {
        ledger_data_dir: temp.path().join("ledger"),
        market_data_dir: temp.path().join("markets"),
        ..Config::default()
    };
    (BettingEngine::open(config).unwrap(), temp)
}

async fn funded(engine: &BettingEngine, user: &str, cents: i64) -> AccountId {
    let account = engine.create_account(user, Currency::USD).unwrap();
    engine
        .deposit(account.id, Decimal::new(cents, 2))
        .await
        .unwrap();
    account.id
}

fn dec(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[tokio::test]
async fn two_sided_market_settles_proportionally() {
    let (engine, _temp) = engine();
    let alice = funded(&engine, "alice", 1000_00).await;
    let bob = funded(&engine, "bob", 1000_00).await;

    let market = engine
        .create_market(
            "Will the home team win?",
            "Season opener",
            BetType::Binary,
            Utc::now() + Duration::hours(1),
        )
        .unwrap();

    engine
        .place_stake(alice, market.id, Outcome::new("yes"), dec(400_00))
        .await
        .unwrap();
    engine
        .place_stake(bob, market.id, Outcome::new("no"), dec(600_00))
        .await
        .unwrap();

    // Funds left the wallets as the stakes were accepted
    assert_eq!(engine.balance(alice).unwrap(), dec(600_00));
    assert_eq!(engine.balance(bob).unwrap(), dec(400_00));
    assert_eq!(engine.get_market(market.id).unwrap().total_pool, dec(1000_00));

    engine.close_market(market.id).await.unwrap();
    let report = engine
        .settle_market(market.id, Outcome::new("yes"))
        .await
        .unwrap();

    // pool 1000, fee 5% -> net 950, sole winner takes it all
    assert_eq!(report.total_pool, dec(1000_00));
    assert_eq!(report.net_pool, dec(950_00));
    assert_eq!(report.fee, dec(50_00));
    assert_eq!(report.total_credited(), dec(950_00));

    assert_eq!(engine.balance(alice).unwrap(), dec(1550_00));
    assert_eq!(engine.balance(bob).unwrap(), dec(400_00));

    // Ledger audit invariant holds for both wallets
    engine.ledger().verify_balance(alice).await.unwrap();
    engine.ledger().verify_balance(bob).await.unwrap();
}

#[tokio::test]
async fn credits_never_exceed_pool() {
    let (engine, _temp) = engine();
    let accounts = [
        funded(&engine, "u1", 500_00).await,
        funded(&engine, "u2", 500_00).await,
        funded(&engine, "u3", 500_00).await,
        funded(&engine, "u4", 500_00).await,
    ];

    let market = engine
        .create_market("M", "", BetType::MultiOutcome, Utc::now() + Duration::hours(1))
        .unwrap();

    // Awkward amounts so the shares do not divide evenly
    for (account, outcome, cents) in [
        (accounts[0], "a", 33_33),
        (accounts[1], "a", 66_67),
        (accounts[2], "b", 100_01),
        (accounts[3], "c", 1_99),
    ] {
        engine
            .place_stake(account, market.id, Outcome::new(outcome), dec(cents))
            .await
            .unwrap();
    }

    engine.close_market(market.id).await.unwrap();
    let report = engine
        .settle_market(market.id, Outcome::new("a"))
        .await
        .unwrap();

    assert!(report.total_credited() <= report.net_pool);
    assert!(report.total_credited() <= report.total_pool);
    assert_eq!(report.fee, report.total_pool - report.total_credited());

    // Every payout has at most two decimal places
    for credit in &report.credits {
        assert!(credit.amount.scale() <= 2);
    }
}

#[tokio::test]
async fn settle_is_idempotent_and_final() {
    let (engine, _temp) = engine();
    let alice = funded(&engine, "alice", 1000_00).await;

    let market = engine
        .create_market("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
        .unwrap();
    engine
        .place_stake(alice, market.id, Outcome::new("yes"), dec(100_00))
        .await
        .unwrap();
    engine.close_market(market.id).await.unwrap();

    let first = engine
        .settle_market(market.id, Outcome::new("yes"))
        .await
        .unwrap();
    let balance_after_first = engine.balance(alice).unwrap();
    let history_after_first = engine.account_transactions(alice).unwrap().len();

    // Same outcome: same report, no new money movement
    let second = engine
        .settle_market(market.id, Outcome::new("yes"))
        .await
        .unwrap();
    assert_eq!(second, first);
    assert_eq!(engine.balance(alice).unwrap(), balance_after_first);
    assert_eq!(
        engine.account_transactions(alice).unwrap().len(),
        history_after_first
    );

    // Different outcome: rejected
    let err = engine
        .settle_market(market.id, Outcome::new("no"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadySettled(_)));
}

#[tokio::test]
async fn settle_requires_closed_market() {
    let (engine, _temp) = engine();

    let market = engine
        .create_market("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
        .unwrap();

    let err = engine
        .settle_market(market.id, Outcome::new("yes"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotYetClosed(_)));
}

#[tokio::test]
async fn settle_rejected_on_cancelled_market() {
    let (engine, _temp) = engine();

    let market = engine
        .create_market("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
        .unwrap();
    engine.cancel_market(market.id).await.unwrap();

    let err = engine
        .settle_market(market.id, Outcome::new("yes"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadySettled(_)));
}

#[tokio::test]
async fn zero_winner_settlement_refunds_in_full() {
    let (engine, _temp) = engine();
    let alice = funded(&engine, "alice", 300_00).await;
    let bob = funded(&engine, "bob", 200_00).await;

    let market = engine
        .create_market("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
        .unwrap();
    engine
        .place_stake(alice, market.id, Outcome::new("no"), dec(300_00))
        .await
        .unwrap();
    engine
        .place_stake(bob, market.id, Outcome::new("no"), dec(200_00))
        .await
        .unwrap();

    engine.close_market(market.id).await.unwrap();
    let report = engine
        .settle_market(market.id, Outcome::new("yes"))
        .await
        .unwrap();

    // Exact stakes returned, no fee taken
    assert!(report.refunded);
    assert_eq!(report.fee, Decimal::ZERO);
    assert_eq!(engine.balance(alice).unwrap(), dec(300_00));
    assert_eq!(engine.balance(bob).unwrap(), dec(200_00));
    assert_eq!(engine.get_market(market.id).unwrap().total_pool, Decimal::ZERO);
}

#[tokio::test]
async fn cancel_refunds_every_stake() {
    let (engine, _temp) = engine();
    let users = [
        funded(&engine, "u1", 100_00).await,
        funded(&engine, "u2", 200_00).await,
        funded(&engine, "u3", 300_00).await,
    ];

    let market = engine
        .create_market("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
        .unwrap();
    for (account, cents) in users.iter().zip([100_00, 200_00, 300_00]) {
        engine
            .place_stake(*account, market.id, Outcome::new("yes"), dec(cents))
            .await
            .unwrap();
    }

    engine.cancel_market(market.id).await.unwrap();

    for (account, cents) in users.iter().zip([100_00, 200_00, 300_00]) {
        assert_eq!(engine.balance(*account).unwrap(), dec(cents));
        engine.ledger().verify_balance(*account).await.unwrap();
    }

    let market = engine.get_market(market.id).unwrap();
    assert_eq!(market.status, MarketStatus::Cancelled);
    assert_eq!(market.total_pool, Decimal::ZERO);

    // Terminal: no close, no settle
    assert!(engine.close_market(market.id).await.is_err());
    assert!(matches!(
        engine
            .settle_market(market.id, Outcome::new("yes"))
            .await
            .unwrap_err(),
        Error::AlreadySettled(_)
    ));
}

#[tokio::test]
async fn stake_after_close_rejected_with_balance_intact() {
    let (engine, _temp) = engine();
    let alice = funded(&engine, "alice", 100_00).await;

    let market = engine
        .create_market("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
        .unwrap();
    engine.close_market(market.id).await.unwrap();

    let err = engine
        .place_stake(alice, market.id, Outcome::new("yes"), dec(50_00))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MarketClosed(_)));
    assert_eq!(engine.balance(alice).unwrap(), dec(100_00));
    assert_eq!(engine.get_market(market.id).unwrap().total_pool, Decimal::ZERO);
}

#[tokio::test]
async fn listing_filters_and_orders() {
    let (engine, _temp) = engine();

    let binary = engine
        .create_market("binary", "", BetType::Binary, Utc::now() + Duration::hours(1))
        .unwrap();
    let multi = engine
        .create_market(
            "multi",
            "",
            BetType::MultiOutcome,
            Utc::now() + Duration::hours(1),
        )
        .unwrap();
    let cancelled = engine
        .create_market("gone", "", BetType::Binary, Utc::now() + Duration::hours(1))
        .unwrap();
    engine.cancel_market(cancelled.id).await.unwrap();

    // Default filter: open markets only
    let open = engine.list_markets(MarketFilter::default()).unwrap();
    let open_ids: Vec<_> = open.iter().map(|m| m.id).collect();
    assert_eq!(open_ids.len(), 2);
    assert!(open_ids.contains(&binary.id));
    assert!(open_ids.contains(&multi.id));

    // Bet-type filter narrows further
    let filter = MarketFilter {
        bet_type: Some(BetType::MultiOutcome),
        ..MarketFilter::default()
    };
    let listed = engine.list_markets(filter).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, multi.id);

    // Cancelled markets appear only when asked for
    let filter = MarketFilter {
        status: Some(MarketStatus::Cancelled),
        ..MarketFilter::default()
    };
    let listed = engine.list_markets(filter).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, cancelled.id);
}

#[tokio::test]
async fn participant_count_tracks_distinct_accounts() {
    let (engine, _temp) = engine();
    let alice = funded(&engine, "alice", 500_00).await;
    let bob = funded(&engine, "bob", 500_00).await;

    let market = engine
        .create_market("M", "", BetType::Binary, Utc::now() + Duration::hours(1))
        .unwrap();

    engine
        .place_stake(alice, market.id, Outcome::new("yes"), dec(100_00))
        .await
        .unwrap();
    engine
        .place_stake(alice, market.id, Outcome::new("no"), dec(100_00))
        .await
        .unwrap();
    engine
        .place_stake(bob, market.id, Outcome::new("yes"), dec(100_00))
        .await
        .unwrap();

    let market = engine.get_market(market.id).unwrap();
    assert_eq!(market.participant_count, 2);
    assert_eq!(market.total_pool, dec(300_00));
}

#[tokio::test]
async fn withdrawal_cannot_overdraw() {
    let (engine, _temp) = engine();
    let alice = funded(&engine, "alice", 50_00).await;

    let err = engine.withdraw(alice, dec(80_00)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Ledger(wallet_ledger::Error::InsufficientFunds { .. })
    ));
    assert_eq!(engine.balance(alice).unwrap(), dec(50_00));
}
