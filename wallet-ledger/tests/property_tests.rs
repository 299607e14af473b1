//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify the critical invariants:
//! - Balance == Σ(transaction amounts) after any operation sequence
//! - Balance never negative (overdrawing debits rejected, no state change)
//! - Rejected operations leave no trace in the log

use proptest::prelude::*;
use rust_decimal::Decimal;
use wallet_ledger::{Config, Currency, Ledger, TxnReason};

/// A single randomized ledger operation
#[derive(Debug, Clone)]
enum Op {
    Credit(Decimal),
    Debit(Decimal),
}

/// Strategy for generating positive cent amounts
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1u64..1_000_00u64).prop_map(|cents| Decimal::new(cents as i64, 2))
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        amount_strategy().prop_map(Op::Credit),
        amount_strategy().prop_map(Op::Debit),
    ]
}

fn create_test_ledger() -> (Ledger, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (Ledger::open(config).unwrap(), temp_dir)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: for any op sequence, the cached balance equals the sum
    /// of the committed log and never goes negative.
    #[test]
    fn prop_balance_equals_transaction_sum(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger();
            let account = ledger.create_account("prop-user", Currency::USD).unwrap();

            let mut expected = Decimal::ZERO;
            for op in &ops {
                match op {
                    Op::Credit(amount) => {
                        ledger
                            .credit(account.id, *amount, TxnReason::Deposit, None)
                            .await
                            .unwrap();
                        expected += *amount;
                    }
                    Op::Debit(amount) => {
                        let result = ledger
                            .debit(account.id, *amount, TxnReason::Withdrawal, None)
                            .await;
                        if *amount <= expected {
                            prop_assert!(result.is_ok());
                            expected -= *amount;
                        } else {
                            prop_assert!(result.is_err());
                        }
                    }
                }
            }

            let balance = ledger.balance(account.id).unwrap();
            prop_assert_eq!(balance, expected);
            prop_assert!(balance >= Decimal::ZERO);

            // Cached balance agrees with the append-only log
            ledger.verify_balance(account.id).await.unwrap();
            let sum: Decimal = ledger
                .account_transactions(account.id)
                .unwrap()
                .iter()
                .map(|t| t.amount)
                .sum();
            prop_assert_eq!(sum, balance);

            Ok(())
        })?;
    }

    /// Property: a rejected debit appends nothing to the log.
    #[test]
    fn prop_rejected_debit_leaves_no_trace(
        funded in amount_strategy(),
        extra in amount_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger();
            let account = ledger.create_account("prop-user", Currency::USD).unwrap();

            ledger
                .credit(account.id, funded, TxnReason::Deposit, None)
                .await
                .unwrap();

            let result = ledger
                .debit(account.id, funded + extra, TxnReason::Stake, None)
                .await;
            prop_assert!(result.is_err());

            let txns = ledger.account_transactions(account.id).unwrap();
            prop_assert_eq!(txns.len(), 1);
            prop_assert_eq!(ledger.balance(account.id).unwrap(), funded);

            Ok(())
        })?;
    }
}
