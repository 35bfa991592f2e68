//! Driver selection and cascading failure under the engine.

use std::sync::Arc;

use domains::{Board, BoardPatch, DomainError, DriverHealth, MockStorageDriver, StorageDriver};
use integration_tests::engine_over;
use storage_adapters::manager::NO_HEALTHY_DRIVER;
use storage_adapters::{DriverManager, MemoryDriver, NamedDriver};

fn healthy_mock() -> MockStorageDriver {
    let mut mock = MockStorageDriver::new();
    mock.expect_health_check().returning(|| Ok(DriverHealth::healthy()));
    mock
}

fn unhealthy_mock() -> MockStorageDriver {
    let mut mock = MockStorageDriver::new();
    mock.expect_health_check().returning(|| Ok(DriverHealth::unhealthy("disk full")));
    mock
}

fn named(name: &str, driver: impl StorageDriver + 'static) -> NamedDriver {
    NamedDriver::new(name, Arc::new(driver))
}

#[tokio::test]
async fn third_driver_is_chosen_when_only_it_is_healthy() {
    let m = DriverManager::new(vec![
        named("remote", unhealthy_mock()),
        named("filesystem", unhealthy_mock()),
        named("sqlite", MemoryDriver::new()),
    ]);
    m.initialize().await.unwrap();

    assert_eq!(m.active_driver_name().as_deref(), Some("sqlite"));
    assert!(!m.fallback_reason().is_empty());
    let healthy: Vec<bool> = m.driver_statuses().iter().map(|s| s.healthy).collect();
    assert_eq!(healthy, vec![false, false, true]);
}

#[tokio::test]
async fn first_driver_wins_when_all_are_healthy() {
    let m = DriverManager::new(vec![
        named("remote", healthy_mock()),
        named("filesystem", healthy_mock()),
        named("sqlite", healthy_mock()),
    ]);
    m.initialize().await.unwrap();

    assert_eq!(m.active_driver_name().as_deref(), Some("remote"));
    assert_eq!(m.fallback_reason(), "");
}

#[tokio::test]
async fn nothing_healthy_falls_back_to_the_first() {
    let m = DriverManager::new(vec![named("remote", unhealthy_mock()), named("sqlite", unhealthy_mock())]);
    m.initialize().await.unwrap();

    assert_eq!(m.active_driver_name().as_deref(), Some("remote"));
    assert_eq!(m.fallback_reason(), NO_HEALTHY_DRIVER);
}

#[tokio::test(start_paused = true)]
async fn engine_persist_cascades_to_the_next_driver() {
    let mut failing = healthy_mock();
    failing.expect_load().returning(|| Ok(vec![]));
    failing
        .expect_save()
        .times(1)
        .returning(|_| Err(DomainError::Backend("database is locked".into())));
    let fallback = Arc::new(MemoryDriver::new());

    let m = Arc::new(DriverManager::new(vec![
        named("sqlite", failing),
        NamedDriver::new("memory", fallback.clone()),
    ]));
    m.initialize().await.unwrap();
    let engine = engine_over(m.clone()).await;

    let board = engine.create_board(BoardPatch::named("Survivor")).await.unwrap();

    assert_eq!(m.active_driver_name().as_deref(), Some("memory"));
    assert!(m.fallback_reason().starts_with("save failed on previous driver"));
    assert_eq!(fallback.load().await.unwrap(), vec![board]);
    assert!(engine.unsynced_boards().is_empty());
}

#[tokio::test]
async fn load_failure_retries_on_the_next_driver() {
    let mut failing = healthy_mock();
    failing.expect_load().returning(|| Err(DomainError::Backend("corrupt header".into())));
    let fallback = Arc::new(MemoryDriver::new());
    fallback.save(&Board::new("Recovered")).await.unwrap();

    let m = Arc::new(DriverManager::new(vec![named("sqlite", failing), NamedDriver::new("memory", fallback)]));
    m.initialize().await.unwrap();
    let engine = engine_over(m.clone()).await;

    assert_eq!(engine.all_boards().len(), 1);
    assert_eq!(m.active_driver_name().as_deref(), Some("memory"));
}
