use mintledger::domain::{Decimal, Mint, Side, TimeMs, Trade, UserId};
use mintledger::engine::{aggregate_position, verify_consistency, LotBook};
use mintledger::LedgerError;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn user() -> UserId {
    UserId::new("user-1".to_string())
}

fn mint() -> Mint {
    Mint::new("BONK".to_string())
}

#[test]
fn test_realized_pnl_worked_example() {
    // Buy 10 @ $1, buy 10 @ $2, sell 15 @ $3:
    // consumes all of lot 1 ($10) plus 5 of lot 2 ($10) = $20 cost,
    // proceeds $45, realized $25.
    let mut book = LotBook::new(user(), mint());
    book.apply_buy(d("10"), d("1"), TimeMs::new(1000)).unwrap();
    book.apply_buy(d("10"), d("2"), TimeMs::new(2000)).unwrap();

    let outcome = book.apply_sell(d("15")).unwrap();
    assert_eq!(outcome.consumed_cost, d("20"));

    let sell = Trade::new(
        Some(3),
        user(),
        mint(),
        Side::Sell,
        d("15"),
        d("3"),
        TimeMs::new(3000),
    );
    let proceeds = sell.notional();
    assert_eq!(proceeds, d("45"));
    assert_eq!(proceeds - outcome.consumed_cost, d("25"));
}

#[test]
fn test_position_invariant_holds_through_trades() {
    let mut book = LotBook::new(user(), mint());
    book.apply_buy(d("10"), d("1.5"), TimeMs::new(1000)).unwrap();
    book.apply_buy(d("4"), d("2.25"), TimeMs::new(2000)).unwrap();
    book.apply_sell(d("7")).unwrap();
    book.apply_buy(d("1"), d("3"), TimeMs::new(3000)).unwrap();
    book.apply_sell(d("2")).unwrap();

    let position = aggregate_position(&user(), &mint(), book.lots());
    assert!(verify_consistency(&position, book.lots()).is_ok());

    // qty: 10 + 4 - 7 + 1 - 2 = 6
    assert_eq!(position.qty, d("6"));
}

#[test]
fn test_rounding_stays_consistent_across_operations() {
    // A repeating-style unit cost must not drift: cost basis always equals
    // the lot sums under half-up rounding at the configured scale.
    let mut book = LotBook::new(user(), mint());
    book.apply_buy(d("3"), d("0.333333333333333333"), TimeMs::new(1000))
        .unwrap();

    book.apply_sell(d("1")).unwrap();
    let position = aggregate_position(&user(), &mint(), book.lots());
    assert!(verify_consistency(&position, book.lots()).is_ok());
    assert_eq!(position.qty, d("2"));
    assert_eq!(position.cost_basis, d("0.666666666666666666"));

    book.apply_sell(d("1")).unwrap();
    let position = aggregate_position(&user(), &mint(), book.lots());
    assert!(verify_consistency(&position, book.lots()).is_ok());
    assert_eq!(position.cost_basis, d("0.333333333333333333"));
}

#[test]
fn test_sell_more_than_held_is_rejected_whole() {
    let mut book = LotBook::new(user(), mint());
    book.apply_buy(d("2"), d("1"), TimeMs::new(1000)).unwrap();
    book.apply_buy(d("2"), d("1"), TimeMs::new(2000)).unwrap();

    let err = book.apply_sell(d("5")).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientInventory { .. }));

    // Both lots untouched.
    let position = aggregate_position(&user(), &mint(), book.lots());
    assert_eq!(position.qty, d("4"));
}

#[test]
fn test_replaying_same_trades_gives_identical_lots() {
    let trades = vec![
        (Side::Buy, "10", "1", 1000),
        (Side::Buy, "5", "2", 2000),
        (Side::Sell, "12", "3", 3000),
        (Side::Buy, "7", "1.1", 4000),
    ];

    let run = || {
        let mut book = LotBook::new(user(), mint());
        for (side, qty, px, at) in &trades {
            match side {
                Side::Buy => {
                    book.apply_buy(d(qty), d(px), TimeMs::new(*at)).unwrap();
                }
                Side::Sell => {
                    book.apply_sell(d(qty)).unwrap();
                }
            }
        }
        book.into_lots()
    };

    assert_eq!(run(), run());
}
