//! Dispatcher behavior: ordering, isolation, single worker, shutdown.

use coach_rs::error::{Error, Result};
use coach_rs::model::UserId;
use coach_rs::tasks::{Dispatcher, DispatcherConfig, Task, TaskHandler};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records the prompt of every task it finishes.
///
/// A few prompts change behavior: `boom` fails, `panic` panics,
/// `sleep:<ms>` sleeps before recording and `block:<ms>` blocks its thread
/// and then yields. Two handlers running at once set `overlapped`.
#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    overlapped: Arc<AtomicBool>,
}

impl Recorder {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

/// Marks a handler as active until it returns or is dropped.
struct Active(Arc<AtomicUsize>);

impl Drop for Active {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskHandler for Recorder {
    async fn handle(&self, task: Task) -> Result<()> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let _active = Active(Arc::clone(&self.active));

        let Task::ExtractNotes { prompt, .. } = task;
        if prompt == "boom" {
            return Err(Error::Other("boom".to_string()));
        }
        if prompt == "panic" {
            panic!("handler blew up");
        }
        if let Some(ms) = prompt.strip_prefix("sleep:") {
            let ms: u64 = ms.parse().unwrap();
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if let Some(ms) = prompt.strip_prefix("block:") {
            let ms: u64 = ms.parse().unwrap();
            std::thread::sleep(Duration::from_millis(ms));
            tokio::task::yield_now().await;
        }
        self.seen.lock().unwrap().push(prompt);
        Ok(())
    }
}

fn task(prompt: &str) -> Task {
    Task::ExtractNotes {
        user_id: UserId::from_handle("guest"),
        prompt: prompt.to_string(),
        response: "ok".to_string(),
    }
}

fn dispatcher() -> (Dispatcher<Recorder>, Recorder) {
    let recorder = Recorder::default();
    let d = Dispatcher::new(recorder.clone(), DispatcherConfig::default());
    (d, recorder)
}

async fn settle(d: &Dispatcher<Recorder>) {
    tokio::time::timeout(Duration::from_secs(5), d.wait_idle())
        .await
        .expect("dispatcher did not go idle");
}

#[tokio::test]
async fn tasks_run_in_submission_order() {
    let (d, rec) = dispatcher();
    for p in ["A", "B", "C"] {
        d.submit(task(p));
    }
    settle(&d).await;

    assert_eq!(rec.seen(), vec!["A", "B", "C"]);
    let stats = d.stats();
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.in_flight(), 0);
}

#[tokio::test]
async fn slow_task_delays_the_next_one() {
    let (d, rec) = dispatcher();
    d.submit(task("sleep:50"));
    d.submit(task("fast"));
    settle(&d).await;

    assert_eq!(rec.seen(), vec!["sleep:50", "fast"]);
}

#[tokio::test]
async fn failing_task_does_not_stop_the_worker() {
    let (d, rec) = dispatcher();
    d.submit(task("boom"));
    d.submit(task("ok"));
    settle(&d).await;

    assert_eq!(rec.seen(), vec!["ok"]);
    let stats = d.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
    assert!(d.is_running());
}

#[tokio::test]
async fn panicking_task_does_not_stop_the_worker() {
    let (d, rec) = dispatcher();
    d.submit(task("panic"));
    d.submit(task("ok"));
    settle(&d).await;

    assert_eq!(rec.seen(), vec!["ok"]);
    let stats = d.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.workers_started, 1);
    assert!(d.is_running());
}

#[tokio::test]
async fn rapid_submits_start_one_worker() {
    let (d, rec) = dispatcher();
    for i in 0..5 {
        d.submit(task(&format!("t{i}")));
    }
    settle(&d).await;

    assert_eq!(rec.seen().len(), 5);
    assert_eq!(d.stats().workers_started, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_start_one_worker() {
    let (d, rec) = dispatcher();
    let barrier = Arc::new(tokio::sync::Barrier::new(16));

    let mut handles = Vec::new();
    for i in 0..16 {
        let d = d.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            d.submit(task(&format!("t{i}")));
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    settle(&d).await;

    assert_eq!(rec.seen().len(), 16);
    let stats = d.stats();
    assert_eq!(stats.workers_started, 1);
    assert_eq!(stats.completed, 16);
}

#[tokio::test]
async fn worker_starts_on_first_submit_and_waits_for_work() {
    let (d, rec) = dispatcher();
    assert!(!d.is_running());
    settle(&d).await;
    assert_eq!(d.stats(), Default::default());

    d.submit(task("first"));
    settle(&d).await;
    assert!(d.is_running());

    // Queue is empty now; the worker must stay parked rather than exit.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(d.is_running());

    d.submit(task("second"));
    settle(&d).await;
    assert_eq!(rec.seen(), vec!["first", "second"]);
    assert_eq!(d.stats().workers_started, 1);
}

#[tokio::test]
async fn shutdown_discards_queue_and_next_submit_restarts() {
    let (d, rec) = dispatcher();
    d.submit(task("sleep:10000"));
    d.submit(task("B"));
    d.submit(task("C"));

    // Let the worker pick up the slow task.
    tokio::time::sleep(Duration::from_millis(50)).await;
    d.shutdown().await;

    assert!(!d.is_running());
    assert!(rec.seen().is_empty());
    let stats = d.stats();
    assert_eq!(stats.discarded, 3);
    assert_eq!(stats.in_flight(), 0);

    d.submit(task("D"));
    settle(&d).await;
    assert_eq!(rec.seen(), vec!["D"]);
    assert_eq!(d.stats().workers_started, 2);
}

#[tokio::test]
async fn shutdown_without_worker_is_a_no_op() {
    let (d, _rec) = dispatcher();
    d.shutdown().await;
    assert!(!d.is_running());
    assert_eq!(d.stats().workers_started, 0);
}

#[tokio::test]
async fn task_timeout_aborts_and_moves_on() {
    let rec = Recorder::default();
    let d = Dispatcher::new(
        rec.clone(),
        DispatcherConfig {
            task_timeout: Some(Duration::from_millis(50)),
        },
    );
    d.submit(task("sleep:5000"));
    d.submit(task("ok"));
    settle(&d).await;

    assert_eq!(rec.seen(), vec!["ok"]);
    let stats = d.stats();
    assert_eq!(stats.timed_out, 1);
    assert_eq!(stats.completed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timed_out_task_stops_before_the_next_starts() {
    let rec = Recorder::default();
    let d = Dispatcher::new(
        rec.clone(),
        DispatcherConfig {
            task_timeout: Some(Duration::from_millis(50)),
        },
    );
    d.submit(task("block:300"));
    d.submit(task("ok"));
    settle(&d).await;

    assert!(!rec.overlapped());
    assert_eq!(rec.seen(), vec!["ok"]);
    assert_eq!(d.stats().timed_out, 1);
}

#[test]
fn task_kind_and_user() {
    let t = task("x");
    assert_eq!(t.kind(), "extract_notes");
    assert_eq!(t.user_id(), UserId::from_handle("guest"));

    let json = serde_json::to_value(&t).unwrap();
    assert_eq!(json["type"], "extract_notes");
}
