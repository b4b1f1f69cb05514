//! End-to-end chain scenarios against the in-memory scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use chainwork::scheduler::{FakeScheduler, SchedulerCall};
use chainwork::{ChainFactory, TaskChain, TaskError};

fn setup() -> (Arc<FakeScheduler>, ChainFactory) {
    let scheduler = Arc::new(FakeScheduler::new());
    let factory = ChainFactory::new(scheduler.clone());
    (scheduler, factory)
}

#[test]
fn mixed_affinity_pipeline_hops_contexts_and_threads_values() {
    let (scheduler, factory) = setup();
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let (l1, l2, l3, l4) = (log.clone(), log.clone(), log.clone(), log.clone());
    let outcome = Arc::new(Mutex::new(None));
    let outcome2 = outcome.clone();

    factory
        .chain()
        .background_first(move || {
            l1.lock().push("load".into());
            Ok(json!({"id": 7, "name": "villager"}))
        })
        .current(move |v| {
            l2.lock().push("validate".into());
            Ok(v)
        })
        .foreground(move |v| {
            l3.lock().push(format!("apply {}", v["name"].as_str().unwrap()));
            Ok(json!(v["id"].as_i64().unwrap() * 2))
        })
        .background_last(move |v| {
            l4.lock().push(format!("persist {v}"));
            Ok(())
        })
        .execute_done(move |ok| *outcome2.lock() = Some(ok))
        .unwrap();

    assert_eq!(
        *log.lock(),
        vec!["load", "validate", "apply villager", "persist 14"]
    );
    assert_eq!(*outcome.lock(), Some(true));
    // One hop per genuine context change; "validate" rides the background
    // context of "load", and "persist" needs a fresh hop off the foreground.
    assert_eq!(
        scheduler.calls(),
        vec![
            SchedulerCall::PostBackground,
            SchedulerCall::PostForeground,
            SchedulerCall::PostBackground,
        ]
    );
}

#[test]
fn starting_from_foreground_runs_leading_foreground_tasks_inline() {
    let scheduler = Arc::new(FakeScheduler::new());
    // Simulate an execute() issued from the host's foreground thread.
    scheduler.set_foreground(true);
    let factory = ChainFactory::new(scheduler.clone());

    factory
        .chain()
        .foreground_first(|| Ok(json!(1)))
        .foreground(|v| Ok(v))
        .background_last(|_| Ok(()))
        .execute()
        .unwrap();

    assert_eq!(scheduler.calls(), vec![SchedulerCall::PostBackground]);
}

#[test]
fn failure_mid_chain_skips_rest_and_reports_once() {
    let (_, factory) = setup();
    let errors = Arc::new(AtomicUsize::new(0));
    let errors2 = errors.clone();
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let outcomes2 = outcomes.clone();
    let later = Arc::new(AtomicUsize::new(0));
    let later2 = later.clone();

    factory
        .chain()
        .background_first(|| Ok(json!("fine")))
        .current(|_| Err(TaskError::failed("simulated io error")))
        .foreground_run(move || {
            later2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .execute_with(
            move |ok| outcomes2.lock().push(ok),
            move |_, _| {
                errors2.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(later.load(Ordering::SeqCst), 0);
    assert_eq!(*outcomes.lock(), vec![false]);
}

#[test]
fn abort_if_chain_with_lookup_guard() {
    let (_, factory) = setup();
    let applied = Arc::new(Mutex::new(Vec::new()));
    let applied2 = applied.clone();
    let warned = Arc::new(AtomicUsize::new(0));
    let warned2 = warned.clone();

    let lookup = |found: bool| move || Ok(if found { json!("entity") } else { Value::Null });

    // Missing entity: warn and stop.
    factory
        .chain()
        .background_first(lookup(false))
        .abort_if_null_with(move || {
            warned2.fetch_add(1, Ordering::SeqCst);
        })
        .foreground_last({
            let applied = applied2.clone();
            move |v| {
                applied.lock().push(v);
                Ok(())
            }
        })
        .execute()
        .unwrap();

    // Present entity: flows through untouched.
    factory
        .chain()
        .background_first(lookup(true))
        .abort_if_null()
        .foreground_last(move |v| {
            applied2.lock().push(v);
            Ok(())
        })
        .execute()
        .unwrap();

    assert_eq!(warned.load(Ordering::SeqCst), 1);
    assert_eq!(*applied.lock(), vec![json!("entity")]);
}

#[test]
fn task_data_shared_across_contexts() {
    let (_, factory) = setup();
    let seen = Arc::new(Mutex::new(None));
    let seen2 = seen.clone();

    factory
        .chain()
        .background_first(|| Ok(json!({"hp": 20})))
        .store_as_data("snapshot")
        .foreground(|_| Ok(json!("unrelated")))
        .return_data("snapshot")
        .background_last(move |v| {
            *seen2.lock() = Some(v);
            Ok(())
        })
        .execute()
        .unwrap();

    assert_eq!(*seen.lock(), Some(json!({"hp": 20})));
}

#[test]
fn shared_chain_serializes_two_submitters() {
    let (_, factory) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));

    // Park the shared chain on a callback we complete manually, so the second
    // submitter appends while the chain is still live.
    let gate: Arc<Mutex<Option<chainwork::TaskCompletion>>> = Arc::new(Mutex::new(None));
    let gate2 = gate.clone();

    let first = factory.shared_chain("world-io");
    let l1 = log.clone();
    first
        .clone()
        .current_first_callback(move |completion| {
            *gate2.lock() = Some(completion);
        })
        .current_run(move || {
            l1.lock().push("first");
            Ok(())
        })
        .execute()
        .unwrap();

    // Same name while live: same chain, append allowed, execute no-ops.
    let second = factory.shared_chain("world-io");
    assert_eq!(second.id(), first.id());
    let l2 = log.clone();
    second
        .current_run(move || {
            l2.lock().push("second");
            Ok(())
        })
        .execute()
        .unwrap();

    assert!(log.lock().is_empty());
    let completion = gate.lock().take().unwrap();
    completion.finish().unwrap();
    assert_eq!(*log.lock(), vec!["first", "second"]);

    // Finished chains leave the registry.
    assert_ne!(factory.shared_chain("world-io").id(), first.id());
}

#[test]
fn drain_mode_runs_everything_inline_including_delays() {
    let (scheduler, factory) = setup();
    scheduler.interrupt_delays();
    factory.shutdown();
    let log = Arc::new(Mutex::new(Vec::new()));
    let (l1, l2) = (log.clone(), log.clone());
    let outcome = Arc::new(Mutex::new(None));
    let outcome2 = outcome.clone();

    factory
        .chain()
        .background_first(move || {
            l1.lock().push("flush");
            Ok(json!(1))
        })
        .delay_ticks(100)
        .foreground_last(move |_| {
            l2.lock().push("late");
            Ok(())
        })
        .execute_done(move |ok| *outcome2.lock() = Some(ok))
        .unwrap();

    // The background and foreground tasks ran inline, and the interrupted
    // delay aborted the chain before "late".
    assert_eq!(*log.lock(), vec!["flush"]);
    assert_eq!(*outcome.lock(), Some(false));
    assert!(scheduler
        .calls()
        .iter()
        .all(|call| matches!(call, SchedulerCall::DelayTicks(_))));
}

#[test]
fn nested_chains_keep_current_chain_straight() {
    let (_, factory) = setup();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let observed2 = observed.clone();
    let inner_factory = factory.clone();

    let outer = factory.chain();
    let outer_id = outer.id();
    outer
        .current_run(move || {
            let observed_inner = observed2.clone();
            inner_factory
                .chain()
                .current_run(move || {
                    observed_inner
                        .lock()
                        .push(("inner", TaskChain::current_chain().map(|c| c.id())));
                    Ok(())
                })
                .execute()
                .map_err(|e| TaskError::failed(e.to_string()))?;
            observed2
                .lock()
                .push(("outer", TaskChain::current_chain().map(|c| c.id())));
            Ok(())
        })
        .execute()
        .unwrap();

    let observed = observed.lock();
    assert_eq!(observed.len(), 2);
    assert_eq!(observed[0].0, "inner");
    assert_ne!(observed[0].1, Some(outer_id));
    assert_eq!(observed[1], ("outer", Some(outer_id)));
    assert!(TaskChain::current_chain().is_none());
}

#[test]
fn error_handler_sees_typed_detail() {
    let (_, factory) = setup();
    let detail = Arc::new(Mutex::new(None));
    let detail2 = detail.clone();

    factory
        .chain()
        .current_first(|| {
            Err(TaskError::failed_with_detail(
                "chunk not loaded",
                json!({"x": 12, "z": -4}),
            ))
        })
        .execute_error(move |err, _| {
            if let TaskError::Failed { detail: Some(d), .. } = err {
                *detail2.lock() = Some(d.clone());
            }
        })
        .unwrap();

    assert_eq!(*detail.lock(), Some(json!({"x": 12, "z": -4})));
}
