//! Delivers a real SIGHUP to this test process.
#![cfg(unix)]

use std::process::Command;
use std::time::Duration;

use consumervisor::{
    Bus, CallbackError, CallbackFn, RunState, RuntimeError, SignalKind, SignalSupervisor,
    stop_callback,
};
use tokio::sync::mpsc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn os_delivery_runs_the_chain() {
    let state = RunState::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut signals = SignalSupervisor::with_signals(Bus::new(16), [SignalKind::Hangup]);
    signals
        .register(SignalKind::Hangup, stop_callback(&state))
        .unwrap();
    signals
        .register(
            SignalKind::Hangup,
            CallbackFn::arc("report", move |signal: SignalKind| -> Result<(), CallbackError> {
                let _ = tx.send(signal);
                Ok(())
            }),
        )
        .unwrap();

    let waiter = state.clone();
    let out: Result<SignalKind, RuntimeError> = signals
        .supervise(async move {
            // Traps are installed before this body runs.
            let status = tokio::task::spawn_blocking(|| {
                Command::new("kill")
                    .args(["-HUP", &std::process::id().to_string()])
                    .status()
            })
            .await
            .expect("kill task panicked")
            .expect("failed to run kill");
            assert!(status.success());

            tokio::time::timeout(Duration::from_secs(5), waiter.stopped())
                .await
                .expect("stop callback never ran");
            let seen = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("report callback never ran")
                .expect("callback dropped");
            Ok::<_, RuntimeError>(seen)
        })
        .await;

    assert_eq!(out.unwrap(), SignalKind::Hangup);
    assert!(!state.is_running());
}
