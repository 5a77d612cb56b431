//! Pool integration tests.
//!
//! Sessions run against a [`Pool`] backed by in-memory mock connections, so
//! the whole acquire / reuse / evict path is exercised without a server.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use mysql_pool::{ConnectionFactory, Pool, PoolConfig, PoolError, PoolStatus};
use mysql_session::{ConnectionError, ConnectionProvider, Error, ProtocolError, session};
use mysql_testing::{MockConnection, RequestLog, Script};

#[derive(Default)]
struct MockFactory {
    log: RequestLog,
    script: Script,
    opened: AtomicU64,
    refuse: AtomicBool,
}

impl MockFactory {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection, PoolError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(PoolError::ConnectionCreation(
                "Can't connect to MySQL server on '127.0.0.1:3306' (111)".into(),
            ));
        }
        let id = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockConnection::with_script(
            id,
            self.log.clone(),
            self.script.clone(),
        ))
    }
}

fn pool_with(script: Script, config: PoolConfig) -> Pool<MockFactory> {
    Pool::new(MockFactory::with_script(script), config).unwrap()
}

async fn run_query(pool: &Pool<MockFactory>, sql: &'static str) -> Result<(), Error> {
    session(pool, |s| {
        Box::pin(async move {
            s.query(sql).await?;
            Ok::<_, Error>(())
        })
    })
    .await
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = Pool::new(MockFactory::default(), PoolConfig::new().max_connections(0));
    assert!(matches!(result, Err(PoolError::Configuration(_))));
}

#[tokio::test]
async fn test_connection_is_reused_after_release() {
    let pool = pool_with(Script::new(), PoolConfig::new());

    run_query(&pool, "SELECT 1 + 1").await.unwrap();
    run_query(&pool, "SELECT 2 + 2").await.unwrap();

    assert_eq!(pool.factory().opened(), 1);
    assert_eq!(
        pool.factory().log.statements(),
        ["SELECT 1 + 1", "SELECT 1", "SELECT 2 + 2"]
    );
    assert_eq!(
        pool.status(),
        PoolStatus {
            available: 1,
            in_use: 0,
            total: 1,
            max: 10,
        }
    );
}

#[tokio::test]
async fn test_discarded_connection_is_evicted() {
    let pool = pool_with(Script::new(), PoolConfig::new().test_on_checkout(false));

    session(&pool, |s| {
        Box::pin(async move {
            s.query("LOCK TABLES t WRITE").await?;
            s.discard().await;
            Ok::<_, Error>(())
        })
    })
    .await
    .unwrap();

    assert_eq!(pool.status().available, 0);
    assert_eq!(pool.status().in_use, 0);

    run_query(&pool, "SELECT 1").await.unwrap();

    assert_eq!(pool.factory().opened(), 2);
    let log = &pool.factory().log;
    assert_eq!(log.statements_for(1), ["LOCK TABLES t WRITE"]);
    assert_eq!(log.statements_for(2), ["SELECT 1"]);
    assert_eq!(log.poison_count(), 0);
}

#[tokio::test]
async fn test_closed_transport_is_not_reused() {
    let pool = pool_with(
        Script::new().with_disconnect("KILL CONNECTION_ID()"),
        PoolConfig::new(),
    );

    let err = run_query(&pool, "KILL CONNECTION_ID()").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::ConnectionClosed)
    ));
    assert_eq!(pool.status().available, 0);

    run_query(&pool, "SELECT 1").await.unwrap();
    assert_eq!(pool.factory().opened(), 2);
}

#[tokio::test]
async fn test_failed_health_check_opens_new_connection() {
    let pool = pool_with(
        Script::new().with_failure("SELECT 'ping'", || ProtocolError::ConnectionClosed),
        PoolConfig::new().health_check_query("SELECT 'ping'"),
    );

    run_query(&pool, "SELECT 1").await.unwrap();
    run_query(&pool, "SELECT 2").await.unwrap();

    assert_eq!(pool.factory().opened(), 2);
    assert_eq!(
        pool.factory().log.statements(),
        ["SELECT 1", "SELECT 'ping'", "SELECT 2"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_checkout_times_out_when_exhausted() {
    let pool = pool_with(
        Script::new(),
        PoolConfig::new()
            .max_connections(1)
            .connection_timeout(Duration::from_secs(2)),
    );

    let held = pool.get().await.unwrap();
    let err = pool.get().await.unwrap_err();
    assert!(matches!(err, PoolError::AcquisitionTimeout(d) if d == Duration::from_secs(2)));

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Timeout(_)));

    pool.put(held);
    assert!(pool.get().await.is_ok());
}

#[tokio::test]
async fn test_waiter_receives_released_connection() {
    let pool = pool_with(
        Script::new(),
        PoolConfig::new().max_connections(1).test_on_checkout(false),
    );

    let held = pool.get().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.get().await.map(|conn| conn.id()) })
    };
    tokio::task::yield_now().await;

    pool.put(held);
    assert_eq!(waiter.await.unwrap().unwrap(), 1);
    assert_eq!(pool.factory().opened(), 1);
}

#[tokio::test]
async fn test_close_rejects_checkouts_and_drains_idle() {
    let pool = pool_with(Script::new(), PoolConfig::new());

    let held = pool.get().await.unwrap();
    run_query(&pool, "SELECT 1").await.unwrap();
    assert_eq!(pool.status().available, 1);

    pool.close().await;
    assert!(pool.is_closed());
    assert_eq!(pool.status().available, 0);

    pool.put(held);
    assert_eq!(pool.status().available, 0);

    assert!(matches!(pool.get().await, Err(PoolError::PoolClosed)));
    let err = run_query(&pool, "SELECT 1").await.unwrap_err();
    assert!(matches!(err, Error::Connection(ConnectionError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn test_expired_connections_are_replaced() {
    let pool = pool_with(
        Script::new(),
        PoolConfig::new()
            .idle_timeout(Duration::from_secs(60))
            .max_lifetime(Duration::from_secs(600))
            .test_on_checkout(false),
    );

    run_query(&pool, "SELECT 1").await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    run_query(&pool, "SELECT 1").await.unwrap();
    assert_eq!(pool.factory().opened(), 2);

    for _ in 0..13 {
        tokio::time::advance(Duration::from_secs(50)).await;
        run_query(&pool, "SELECT 1").await.unwrap();
    }
    assert_eq!(pool.factory().opened(), 3);
}

#[tokio::test]
async fn test_factory_failure_is_surfaced_to_session() {
    let factory = MockFactory::default();
    factory.refuse.store(true, Ordering::SeqCst);
    let pool = Pool::new(factory, PoolConfig::new()).unwrap();

    let err = run_query(&pool, "SELECT 1").await.unwrap_err();

    assert!(matches!(
        err,
        Error::Connection(ConnectionError::Unavailable(ref msg)) if msg.contains("(111)")
    ));
    assert_eq!(pool.status().in_use, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_session_frees_slot() {
    let pool = pool_with(
        Script::new().with_hang("SELECT SLEEP(60)"),
        PoolConfig::new().max_connections(1),
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        run_query(&pool, "SELECT SLEEP(60)"),
    )
    .await;
    assert!(outcome.is_err());

    assert_eq!(pool.status().in_use, 0);
    assert_eq!(pool.status().available, 0);

    run_query(&pool, "SELECT 1").await.unwrap();
    assert_eq!(pool.factory().opened(), 2);
}
