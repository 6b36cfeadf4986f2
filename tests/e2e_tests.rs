//! End-to-end replay tests
//!
//! Each test replays `tests/fixtures/<name>/input.csv` through a fresh
//! in-memory wallet and compares the balances CSV with `expected.csv`.
//!
//! Fixtures cover:
//! - Happy path add / transfer / withdraw flows
//! - Insufficient wallet and bank balances
//! - Unknown users and self transfers
//! - Half-up rounding of fractional amounts
//! - Malformed rows and rejected registrations
//! - Online fraud limits (single amount, rapid top-up, velocity)
//!
//! Each fixture runs under both strategies. Fixtures only use operations
//! whose outcome does not depend on the order between different users, so
//! the async strategy must produce the same output as the sync one.
//!
//! The restart tests reopen a wallet on the same snapshot store and check
//! that balances and already-synced offline transactions carry over.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::{NamedTempFile, TempDir};
    use wallet_ledger::cli::StrategyType;
    use wallet_ledger::core::{SnapshotStore, Wallet};
    use wallet_ledger::io::{JsonFileStore, MemoryStore};
    use wallet_ledger::strategy::create_strategy;
    use wallet_ledger::OfflineTransaction;

    fn replay(wallet: &Arc<Wallet>, input_path: &str, strategy_type: StrategyType) -> String {
        let strategy = create_strategy(strategy_type, None);
        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        strategy
            .process(wallet, Path::new(input_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to process operations: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e))
    }

    /// Replay a fixture's input.csv and compare with its expected.csv
    fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );

        let wallet = Arc::new(Wallet::builder().build().expect("Failed to build wallet"));
        let actual_output = replay(&wallet, &input_path, strategy_type);

        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("insufficient_funds")]
    #[case("unknown_users")]
    #[case("precision_rounding")]
    #[case("malformed_data")]
    #[case("fraud_limits")]
    #[case("velocity_limit")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy);
    }

    /// Balances survive a restart when a data directory is used
    #[rstest]
    fn test_snapshot_survives_restart(
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        let data_dir = TempDir::new().expect("Failed to create temp dir");

        let open = || {
            let store: Arc<dyn SnapshotStore> =
                Arc::new(JsonFileStore::new(data_dir.path()).expect("Failed to open store"));
            Arc::new(Wallet::builder().store(store).build().expect("Failed to build wallet"))
        };

        let first = replay(&open(), "tests/fixtures/happy_path/input.csv", strategy);
        assert!(data_dir.path().join("ledger.json").exists());

        // alice is already registered; the top-up lands on the restored balances
        let mut input = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(input, "type,user,peer,amount\nregister,alice,123456,1\nadd_money,alice,,1")
            .expect("Failed to write input");
        input.flush().expect("Failed to flush input");

        let second = replay(&open(), input.path().to_str().unwrap(), strategy);

        assert_eq!(
            first,
            "username,wallet,bank\nalice,749.50,59000.00\nbob,1400.00,3500.00\ncarol,350.50,0.00\n"
        );
        assert_eq!(
            second,
            "username,wallet,bank\nalice,750.50,58999.00\nbob,1400.00,3500.00\ncarol,350.50,0.00\n"
        );
    }

    fn wallet_on(store: Arc<dyn SnapshotStore>) -> Wallet {
        Wallet::builder().store(store).build().expect("Failed to build wallet")
    }

    fn wallet_balance(wallet: &Wallet, username: &str) -> Decimal {
        wallet
            .get_user_by_username(username)
            .expect("user should exist")
            .wallet_balance()
    }

    /// A synced offline batch resubmitted after a restart moves no money
    #[rstest]
    #[case::json_file(true)]
    #[case::memory(false)]
    fn test_offline_batch_resubmitted_after_restart(#[case] on_disk: bool) {
        let data_dir = TempDir::new().expect("Failed to create temp dir");
        let memory: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let store = || {
            if !on_disk {
                return memory.clone();
            }
            let file: Arc<dyn SnapshotStore> =
                Arc::new(JsonFileStore::new(data_dir.path()).expect("Failed to open store"));
            file
        };

        let wallet = wallet_on(store());
        let alice = wallet
            .register_with_bank_balance("alice", "123456", Decimal::from(5_000))
            .unwrap();
        let bob = wallet
            .register_with_bank_balance("bob", "654321", Decimal::ZERO)
            .unwrap();
        wallet.add_money(&alice.user_id, Decimal::from(1_000)).unwrap();

        let batch = vec![OfflineTransaction::signed_transfer(
            "OFF_1",
            bob.user_id.as_str(),
            Decimal::from(100),
            1_700_000_000_000,
        )];
        let first = wallet.sync_offline(&alice.user_id, batch.clone());
        assert!(first.success);
        drop(wallet);

        let reopened = wallet_on(store());
        let second = reopened.sync_offline(&alice.user_id, batch);

        assert!(second.success);
        assert_eq!(second.synced_transactions, first.synced_transactions);
        assert_eq!(wallet_balance(&reopened, "alice"), Decimal::from(900));
        assert_eq!(wallet_balance(&reopened, "bob"), Decimal::from(100));
        assert_eq!(reopened.transactions(&bob.user_id).len(), 1);
    }
}
