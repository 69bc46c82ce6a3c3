//! End-to-end shutdown scenarios against the in-process broker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use consumervisor::{
    Batch, Bus, CallbackError, CallbackFn, CallbackRef, Config, DispatchPolicy, EventKind,
    HandlerError, HandlerFn, HandlerRef, Inline, ListenerBinding, MemoryBroker, MemoryDriver,
    Orchestrator, RunState, RuntimeBuilder, RuntimeError, Scheduling, SignalKind, SignalSupervisor,
    WorkFn, WorkRef, stop_callback,
};
use tokio::sync::mpsc;

const RUN_LIMIT: Duration = Duration::from_secs(10);

fn driver(broker: &MemoryBroker) -> MemoryDriver {
    MemoryDriver::new(broker.clone()).with_poll_timeout(Duration::from_millis(10))
}

fn terminate_only(scheduling: Scheduling) -> Config {
    Config::setup(|cfg| {
        cfg.scheduling = scheduling;
        cfg.signals = vec![SignalKind::Terminate];
    })
}

fn noop() -> HandlerRef {
    HandlerFn::arc("noop", |_b: Batch| async { Ok::<_, HandlerError>(()) })
}

#[tokio::test]
async fn signal_after_last_message_drains_and_stops() {
    for scheduling in [Scheduling::RoundRobin, Scheduling::PerListener] {
        let broker = MemoryBroker::new();
        for i in 0..10u8 {
            broker.publish("payments", vec![i]);
        }
        broker.create_topic("refunds");

        let (raise_tx, mut raise_rx) = mpsc::unbounded_channel::<()>();
        let handled = Arc::new(AtomicUsize::new(0));
        let handler: HandlerRef = {
            let handled = handled.clone();
            HandlerFn::arc("payments", move |batch: Batch| {
                if handled.fetch_add(batch.len(), Ordering::SeqCst) + batch.len() == 10 {
                    let _ = raise_tx.send(());
                }
                async { Ok::<_, HandlerError>(()) }
            })
        };

        let runtime = RuntimeBuilder::new(terminate_only(scheduling))
            .with_bindings([
                ListenerBinding::new("payments", "billing", handler)
                    .with_dispatch(DispatchPolicy::PerMessage),
                ListenerBinding::new("refunds", "billing", noop()),
            ])
            .build(&driver(&broker))
            .unwrap();
        assert_eq!(
            runtime.listeners().collect::<Vec<_>>(),
            vec!["billing/payments", "billing/refunds"]
        );

        let signals = runtime.signal_handle();
        let raiser = tokio::spawn(async move {
            if raise_rx.recv().await.is_some() {
                signals.raise(SignalKind::Terminate).unwrap();
            }
        });

        let state = runtime.state().clone();
        tokio::time::timeout(RUN_LIMIT, runtime.run(Arc::new(Inline)))
            .await
            .expect("run did not stop")
            .unwrap();
        raiser.await.unwrap();

        assert!(!state.is_running());
        assert_eq!(handled.load(Ordering::SeqCst), 10, "{scheduling:?}");
        assert_eq!(broker.lag("payments", "billing"), 0);
    }
}

#[tokio::test]
async fn double_delivery_runs_the_chain_twice() {
    let broker = MemoryBroker::new();
    broker.create_topic("payments");
    let bus = Bus::new(64);
    let state = RunState::new();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter: CallbackRef =
        CallbackFn::arc("count", move |signal: SignalKind| -> Result<(), CallbackError> {
            let _ = tx.send(signal);
            Ok(())
        });

    let mut signals = SignalSupervisor::with_signals(bus.clone(), [SignalKind::Terminate]);
    signals
        .register(SignalKind::Terminate, stop_callback(&state))
        .unwrap();
    signals.register(SignalKind::Terminate, counter).unwrap();
    let handle = signals.handle();
    handle.raise(SignalKind::Terminate).unwrap();
    handle.raise(SignalKind::Terminate).unwrap();

    let orchestrator = Orchestrator::new(
        &Config::default(),
        state.clone(),
        bus,
        &driver(&broker),
        &[ListenerBinding::new("payments", "billing", noop())],
    )
    .unwrap();

    let out: Result<(), RuntimeError> = signals
        .supervise(async move {
            orchestrator.run(Arc::new(Inline)).await?;
            for _ in 0..2 {
                tokio::time::timeout(RUN_LIMIT, rx.recv())
                    .await
                    .expect("delivery lost")
                    .expect("callback dropped");
            }
            Ok::<_, RuntimeError>(())
        })
        .await;

    out.unwrap();
    assert!(!state.is_running());
}

#[tokio::test]
async fn failing_listener_ends_run_without_stopping() {
    let broker = MemoryBroker::new();
    broker.create_topic("payments");
    broker.create_topic("refunds");
    broker.inject_fault("refunds", "leader not available");

    let runtime = RuntimeBuilder::new(terminate_only(Scheduling::RoundRobin))
        .with_binding(ListenerBinding::new("payments", "billing", noop()))
        .with_binding(ListenerBinding::new("refunds", "billing", noop()))
        .build(&driver(&broker))
        .unwrap();
    let state = runtime.state().clone();

    let err = tokio::time::timeout(RUN_LIMIT, runtime.run(Arc::new(Inline)))
        .await
        .expect("run did not return")
        .unwrap_err();

    assert!(!err.is_startup_fatal());
    match err {
        RuntimeError::Listener(e) => {
            assert_eq!(e.listener(), "billing/refunds");
            assert_eq!(e.as_label(), "listener_poll_failed");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(state.is_running());
}

#[tokio::test]
async fn unknown_topic_is_startup_fatal() {
    let broker = MemoryBroker::new();
    broker.create_topic("payments");

    let err = RuntimeBuilder::new(Config::default())
        .with_binding(ListenerBinding::new("payments", "billing", noop()))
        .with_binding(ListenerBinding::new("missing", "billing", noop()))
        .build(&driver(&broker))
        .unwrap_err();

    assert!(err.is_startup_fatal());
    assert!(matches!(
        err,
        RuntimeError::Connect { ref binding, .. } if binding == "billing/missing"
    ));
}

#[tokio::test]
async fn failing_callbacks_do_not_block_later_ones() {
    let broker = MemoryBroker::new();
    broker.create_topic("payments");

    let failing: CallbackRef =
        CallbackFn::arc("failing", |_: SignalKind| -> Result<(), CallbackError> {
            Err(CallbackError::fail("flush target gone"))
        });
    let panicking: CallbackRef =
        CallbackFn::arc("panicking", |_: SignalKind| -> Result<(), CallbackError> {
            panic!("callback exploded")
        });
    let (tx, mut rx) = mpsc::unbounded_channel();
    let last: CallbackRef =
        CallbackFn::arc("last", move |_: SignalKind| -> Result<(), CallbackError> {
            let _ = tx.send(());
            Ok(())
        });

    let runtime = RuntimeBuilder::new(terminate_only(Scheduling::RoundRobin))
        .with_binding(ListenerBinding::new("payments", "billing", noop()))
        .on_signal(SignalKind::Terminate, failing)
        .on_signal(SignalKind::Terminate, panicking)
        .on_signal(SignalKind::Terminate, last)
        .build(&driver(&broker))
        .unwrap();
    let mut events = runtime.bus().subscribe();
    runtime.signal_handle().raise(SignalKind::Terminate).unwrap();

    tokio::time::timeout(RUN_LIMIT, runtime.run(Arc::new(Inline)))
        .await
        .expect("run did not stop")
        .unwrap();
    tokio::time::timeout(RUN_LIMIT, rx.recv())
        .await
        .expect("last callback never ran")
        .expect("callback dropped");

    let mut failed = Vec::new();
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::CallbackFailed {
            failed.push(ev.source.as_deref().unwrap_or_default().to_string());
        }
    }
    assert_eq!(failed, vec!["failing", "panicking"]);
}

#[tokio::test]
async fn work_wrapper_sees_every_batch() {
    let broker = MemoryBroker::new();
    for i in 0..4u8 {
        broker.publish("payments", vec![i]);
    }

    let state = RunState::new();
    let wrapped = Arc::new(AtomicUsize::new(0));
    let work: WorkRef = {
        let wrapped = wrapped.clone();
        let state = state.clone();
        WorkFn::arc(move |handler: HandlerRef, batch: Batch| {
            let wrapped = wrapped.clone();
            let state = state.clone();
            async move {
                let n = batch.len();
                handler.handle(batch).await?;
                if wrapped.fetch_add(n, Ordering::SeqCst) + n == 4 {
                    state.stop();
                }
                Ok::<_, HandlerError>(())
            }
        })
    };

    let runtime = RuntimeBuilder::new(terminate_only(Scheduling::RoundRobin))
        .with_state(state.clone())
        .with_binding(ListenerBinding::new("payments", "billing", noop()))
        .build(&driver(&broker).with_max_batch(3))
        .unwrap();

    tokio::time::timeout(RUN_LIMIT, runtime.run(work))
        .await
        .expect("run did not stop")
        .unwrap();

    assert_eq!(wrapped.load(Ordering::SeqCst), 4);
    assert!(!state.is_running());
}
