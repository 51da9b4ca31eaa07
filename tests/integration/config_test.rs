//! Configuration loading

use ema_trail::config::{Config, ExecutionMode};
use rust_decimal_macros::dec;
use std::time::Duration;

#[test]
fn test_config_example_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = Config::load(path).unwrap();

    assert_eq!(config.exchange.mode, ExecutionMode::Paper);
    assert_eq!(config.reconcile.interval(), Duration::from_secs(60));
    assert_eq!(config.reconcile.price_threshold, dec!(0.003));
    assert_eq!(config.store.path.to_str(), Some("orders.json"));
}

#[test]
fn test_cli_builds_paper_service() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.store.path = dir.path().join("orders.json");
    config.paper.book_path = dir.path().join("book.json");

    assert!(ema_trail::cli::build_service(&config).is_ok());

    config.exchange.mode = ExecutionMode::Live;
    assert!(ema_trail::cli::build_service(&config).is_err());
}
