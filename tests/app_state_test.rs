use kitchen_ops::{config::AppConfig, db, AppState};

#[tokio::test]
async fn build_checks_the_pool_and_migrates() {
    let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.auto_migrate = true;

    let (state, _events) = AppState::build(cfg).await.expect("build app state");
    db::check_connection(&state.db).await.expect("pool answers");

    // The schema is in place once build returns.
    let page = state
        .services
        .kitchen_stock
        .list(&Default::default(), None)
        .await
        .expect("list stock");
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn build_fails_on_an_unreachable_database() {
    let mut cfg = AppConfig::new(
        "sqlite:///nonexistent-dir/kitchen.db?mode=ro".to_string(),
        "test".to_string(),
    );
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 0;
    cfg.db_acquire_timeout_secs = 1;

    assert!(AppState::build(cfg).await.is_err());
}
