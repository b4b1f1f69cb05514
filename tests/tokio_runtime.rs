//! Chain scenarios running on a real tokio-backed scheduler.
//!
//! The test body plays the host's game loop: it drains the foreground
//! executor in a polling loop until the chain signals completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;

use chainwork::scheduler::{ForegroundExecutor, GameScheduler, TokioScheduler};
use chainwork::ChainFactory;

/// Drive the foreground executor until `done_rx` yields, or fail after 10s.
async fn pump_until_done<T>(executor: &mut ForegroundExecutor, done_rx: &mpsc::Receiver<T>) -> T {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        executor.run_until_idle();
        if let Ok(value) = done_rx.try_recv() {
            return value;
        }
        assert!(Instant::now() < deadline, "chain did not finish in time");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn background_work_lands_back_on_the_foreground_drainer() {
    let (scheduler, mut executor) = TokioScheduler::new(Duration::from_millis(5));
    let factory = ChainFactory::new(scheduler.clone());
    let (done_tx, done_rx) = mpsc::channel();
    let foreground_seen = Arc::new(AtomicBool::new(false));
    let foreground_seen2 = foreground_seen.clone();
    let scheduler2 = scheduler.clone();

    factory
        .chain()
        .background_first(move || {
            // Blocking is fine here; this runs on the blocking pool.
            std::thread::sleep(Duration::from_millis(10));
            Ok(json!("computed"))
        })
        .foreground_last(move |v| {
            assert_eq!(v, json!("computed"));
            foreground_seen2.store(scheduler2.is_foreground_thread(), Ordering::SeqCst);
            Ok(())
        })
        .execute_done(move |ok| {
            let _ = done_tx.send(ok);
        })
        .unwrap();

    let ok = pump_until_done(&mut executor, &done_rx).await;
    assert!(ok);
    assert!(foreground_seen.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread")]
async fn delay_ticks_resumes_after_the_tick_interval() {
    let (scheduler, mut executor) = TokioScheduler::new(Duration::from_millis(5));
    let factory = ChainFactory::new(scheduler);
    let (done_tx, done_rx) = mpsc::channel();
    let started = Instant::now();

    factory
        .chain()
        .current_first(|| Ok(json!("held")))
        .delay_ticks(4)
        .current_last(move |v| {
            assert_eq!(v, json!("held"));
            Ok(())
        })
        .execute_done(move |ok| {
            let _ = done_tx.send(ok);
        })
        .unwrap();

    let ok = pump_until_done(&mut executor, &done_rx).await;
    assert!(ok);
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[tokio::test(flavor = "multi_thread")]
async fn deferred_task_completed_from_a_plain_thread() {
    let (_scheduler, mut executor) = TokioScheduler::new(Duration::from_millis(5));
    let factory = ChainFactory::new(_scheduler);
    let (done_tx, done_rx) = mpsc::channel();
    let delivered = Arc::new(Mutex::new(None));
    let delivered2 = delivered.clone();

    factory
        .chain()
        .current_first_callback(|completion| {
            // Hand the continuation to a foreign thread, the way a callback
            // API with its own thread pool would.
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5));
                completion.complete(json!("from elsewhere")).unwrap();
            });
        })
        .foreground_last(move |v| {
            *delivered2.lock() = Some(v);
            Ok(())
        })
        .execute_done(move |ok| {
            let _ = done_tx.send(ok);
        })
        .unwrap();

    let ok = pump_until_done(&mut executor, &done_rx).await;
    assert!(ok);
    assert_eq!(*delivered.lock(), Some(json!("from elsewhere")));
}

#[tokio::test(flavor = "multi_thread")]
async fn scheduler_shutdown_interrupts_a_waiting_chain() {
    let (scheduler, mut executor) = TokioScheduler::new(Duration::from_millis(5));
    let factory = ChainFactory::new(scheduler.clone());
    let (done_tx, done_rx) = mpsc::channel();
    let reached = Arc::new(AtomicBool::new(false));
    let reached2 = reached.clone();

    factory
        .chain()
        .current_first(|| Ok(json!(1)))
        .delay(Duration::from_secs(60))
        .current_run(move || {
            reached2.store(true, Ordering::SeqCst);
            Ok(())
        })
        .execute_done(move |ok| {
            let _ = done_tx.send(ok);
        })
        .unwrap();

    // Give the delay a moment to be registered, then pull the plug.
    tokio::time::sleep(Duration::from_millis(20)).await;
    scheduler.shutdown();

    let ok = pump_until_done(&mut executor, &done_rx).await;
    assert!(!ok);
    assert!(!reached.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread")]
async fn factory_shutdown_drains_new_chains_inline() {
    let (scheduler, _executor) = TokioScheduler::new(Duration::from_millis(5));
    let factory = ChainFactory::new(scheduler.clone());
    scheduler.shutdown();

    let (done_tx, done_rx) = mpsc::channel();
    let log = Arc::new(Mutex::new(Vec::new()));
    let (l1, l2) = (log.clone(), log.clone());

    // With the drain signal up, even foreground tasks run inline on this
    // thread; nothing depends on the executor being pumped.
    factory
        .chain()
        .background_first(move || {
            l1.lock().push("save");
            Ok(json!(1))
        })
        .foreground_last(move |_| {
            l2.lock().push("notify");
            Ok(())
        })
        .execute_done(move |ok| {
            let _ = done_tx.send(ok);
        })
        .unwrap();

    let ok = done_rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(ok);
    assert_eq!(*log.lock(), vec!["save", "notify"]);
}
