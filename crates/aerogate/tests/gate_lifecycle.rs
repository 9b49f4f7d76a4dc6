//! Lifecycle tests for the bootstrap gate
//!
//! Timing-sensitive tests run on tokio's paused clock so that sleeps and
//! timeouts resolve deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use aerogate::prelude::*;
use async_trait::async_trait;
use tokio::sync::Notify;

#[derive(Debug, thiserror::Error, PartialEq)]
enum DriverError {
    #[error("connection refused by {0}")]
    Refused(String),
}

#[derive(Debug)]
struct FakeClient {
    endpoint: String,
    alive: Arc<AtomicBool>,
}

#[async_trait]
impl Liveness for FakeClient {
    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

fn slow_factory(delay: Duration) -> impl ConnectionFactory<FakeClient> {
    move |host: String, port: u16| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, BoxError>(FakeClient {
            endpoint: format!("{host}:{port}"),
            alive: Arc::new(AtomicBool::new(true)),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_factory_scenario() {
    let start = tokio::time::Instant::now();
    let gate = BootstrapGate::new("127.0.0.1", 3000, "ns", "s", slow_factory(Duration::from_millis(300)))
        .unwrap();

    let err = gate.wait_for_ready(Duration::from_millis(200)).await.unwrap_err();
    assert!(matches!(err, GateError::ClientConnTimeout(_)));
    assert!(err.is_transient());
    assert!(matches!(gate.check_connection(), Err(GateError::AlreadyConnecting)));

    tokio::time::sleep_until(start + Duration::from_millis(300)).await;
    gate.wait_for_ready(Duration::from_millis(200)).await.unwrap();
    assert!(gate.check_connection().is_ok());
    assert_eq!(gate.handle().unwrap().endpoint, "127.0.0.1:3000");
}

#[tokio::test(start_paused = true)]
async fn test_ready_is_permanent_and_immediate() {
    let gate = BootstrapGate::new("h", 1, "ns", "s", slow_factory(Duration::from_millis(50))).unwrap();
    gate.wait_for_ready(Duration::from_secs(1)).await.unwrap();

    let before = tokio::time::Instant::now();
    for _ in 0..5 {
        gate.wait_for_ready(Duration::ZERO).await.unwrap();
        assert!(gate.check_connection().is_ok());
    }
    assert_eq!(tokio::time::Instant::now(), before);
}

#[tokio::test]
async fn test_factory_error_is_recoverable_by_cause() {
    let gate = BootstrapGate::<FakeClient>::new("10.0.0.9", 3000, "ns", "s", |host: String, _: u16| async move {
        Err::<FakeClient, BoxError>(Box::new(DriverError::Refused(host)))
    })
    .unwrap();

    // Readiness covers failure too.
    gate.wait_for_ready(Duration::from_secs(1)).await.unwrap();
    assert!(gate.handle().is_none());

    for _ in 0..3 {
        let err = gate.check_connection().unwrap_err();
        let GateError::Init(init) = &err else {
            panic!("expected init failure, got {err:?}");
        };
        assert_eq!(
            init.downcast_ref::<DriverError>(),
            Some(&DriverError::Refused("10.0.0.9".into()))
        );
        assert!(err.init_cause().unwrap().is::<DriverError>());
        assert!(!err.is_transient());
    }

    assert_eq!(gate.status(), ConnectionStatus::Failed);
    let err = gate.ready_handle(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, GateError::Init(_)));
}

#[tokio::test]
async fn test_panicking_factory_still_becomes_ready() {
    let gate = BootstrapGate::<FakeClient>::new("h", 1, "ns", "s", |_: String, _: u16| async move {
        if true {
            panic!("driver exploded");
        }
        Err::<FakeClient, BoxError>("unreachable".into())
    })
    .unwrap();

    gate.wait_for_ready(Duration::from_secs(1)).await.unwrap();
    let err = gate.check_connection().unwrap_err();
    let panic = err
        .init_cause()
        .and_then(|cause| cause.downcast_ref::<FactoryPanic>())
        .expect("panic recorded as cause");
    assert_eq!(panic.message, "driver exploded");
}

#[tokio::test]
async fn test_blocking_factory() {
    let gate = BootstrapGate::new(
        "legacy-host",
        3000,
        "ns",
        "s",
        blocking(|host: &str, port: u16| -> Result<String, BoxError> {
            std::thread::sleep(Duration::from_millis(20));
            Ok(format!("{host}:{port}"))
        }),
    )
    .unwrap();

    let handle = gate.ready_handle(Duration::from_secs(5)).await.unwrap();
    assert_eq!(handle, "legacy-host:3000");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_wait() {
    let gate = BootstrapGate::new("h", 1, "ns", "s", slow_factory(Duration::from_secs(60))).unwrap();
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let err = gate
        .wait_for_ready_or_cancel(Duration::from_secs(30), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Cancelled));
    assert!(!gate.is_ready());
}

#[tokio::test]
async fn test_ready_wins_over_cancelled_token() {
    let gate = BootstrapGate::new("h", 1, "ns", "s", slow_factory(Duration::ZERO)).unwrap();
    gate.wait_for_ready(Duration::from_secs(1)).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    gate.wait_for_ready_or_cancel(Duration::from_secs(1), &cancel)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_wait_still_times_out() {
    let gate = BootstrapGate::new("h", 1, "ns", "s", slow_factory(Duration::from_secs(60))).unwrap();
    let cancel = CancellationToken::new();

    let err = gate
        .wait_for_ready_or_cancel(Duration::from_millis(100), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::ClientConnTimeout(_)));
}

#[tokio::test]
async fn test_probe_connection() {
    let alive = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&alive);
    let gate = BootstrapGate::new("h", 1, "ns", "s", move |host: String, port: u16| {
        let alive = Arc::clone(&flag);
        async move {
            Ok::<_, BoxError>(FakeClient {
                endpoint: format!("{host}:{port}"),
                alive,
            })
        }
    })
    .unwrap();

    gate.wait_for_ready(Duration::from_secs(1)).await.unwrap();
    gate.probe_connection().await.unwrap();

    alive.store(false, Ordering::SeqCst);
    assert!(matches!(gate.probe_connection().await, Err(GateError::Unhealthy)));
    // The basic check only reflects initialization.
    assert!(gate.check_connection().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_probe_while_connecting() {
    let gate = BootstrapGate::new("h", 1, "ns", "s", slow_factory(Duration::from_secs(5))).unwrap();
    assert!(matches!(
        gate.probe_connection().await,
        Err(GateError::AlreadyConnecting)
    ));
}

#[tokio::test]
async fn test_health_report_transitions() {
    let release = Arc::new(Notify::new());
    let gate_release = Arc::clone(&release);
    let gate = BootstrapGate::<FakeClient>::new("db", 3000, "ns", "s", move |_: String, _: u16| {
        let release = Arc::clone(&gate_release);
        async move {
            release.notified().await;
            Err::<FakeClient, BoxError>(Box::new(DriverError::Refused("db".into())))
        }
    })
    .unwrap();

    let report = gate.health_report();
    assert_eq!(report.status, ConnectionStatus::Connecting);
    assert_eq!(report.endpoint, "db:3000");
    assert!(report.error.is_none());

    release.notify_one();
    gate.wait_for_ready(Duration::from_secs(1)).await.unwrap();

    let report = gate.health_report();
    assert_eq!(report.status, ConnectionStatus::Failed);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "failed");
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("connection refused by db")
    );
}

#[test]
fn test_abandoned_bootstrap() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let gate = runtime
        .block_on(async {
            BootstrapGate::new("h", 1, "ns", "s", |_: String, _: u16| async {
                std::future::pending::<Result<String, BoxError>>().await
            })
        })
        .unwrap();
    assert!(matches!(gate.check_connection(), Err(GateError::AlreadyConnecting)));

    // Shutting the runtime down drops the bootstrap task mid-flight.
    drop(runtime);

    assert!(matches!(gate.check_connection(), Err(GateError::Abandoned)));
    assert_eq!(gate.status(), ConnectionStatus::Abandoned);
    assert!(!gate.is_ready());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let err = runtime
        .block_on(gate.wait_for_ready(Duration::from_secs(1)))
        .unwrap_err();
    assert!(matches!(err, GateError::Abandoned));
}
