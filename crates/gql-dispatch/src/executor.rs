//! The action scheduler.
//!
//! Every [`ActionExecutor`] owns one background task that holds the
//! [`ActionQueue`]. Submissions reach it over an unbounded channel; the task
//! waits one batch window after the first submission so that a burst of
//! queries lands in the queue together, then drains the queue head:
//!
//! - a mutation at the head is popped and sent alone;
//! - a query at the head is popped together with every query directly
//!   behind it, and the run is sent with `send_one` (length 1) or
//!   `send_batch` (length ≥ 2).
//!
//! Only one dispatch is in flight at a time. Actions submitted meanwhile wait
//! in the channel until it settles, then the next pass is armed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::action::{Action, ActionFuture, ActionKind};
use crate::queue::ActionQueue;
use crate::transport::Transport;
use crate::DispatchError;

/// Default time the scheduler lets submissions accumulate before a pass.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(1);

// ─── ActionExecutor ───────────────────────────────────────────────────────

/// Handle for submitting actions to a scheduler task.
///
/// Must be created inside a Tokio runtime. Dropping the handle lets the
/// scheduler finish whatever was already submitted, then exit.
#[derive(Debug)]
pub struct ActionExecutor {
    tx: mpsc::UnboundedSender<Action>,
    dispatching: Arc<AtomicBool>,
}

impl ActionExecutor {
    pub fn new<T: Transport>(transport: T) -> Self {
        Self::with_batch_window(transport, DEFAULT_BATCH_WINDOW)
    }

    /// `batch_window` of zero means a single scheduler yield.
    pub fn with_batch_window<T: Transport>(transport: T, batch_window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatching = Arc::new(AtomicBool::new(false));

        let scheduler = Scheduler {
            queue: ActionQueue::new(),
            rx,
            transport,
            dispatching: Arc::clone(&dispatching),
            batch_window,
        };
        tokio::spawn(scheduler.run());

        ActionExecutor { tx, dispatching }
    }

    /// Queue `action` and return its result handle.
    pub fn execute(&self, action: Action) -> ActionFuture {
        let future = action.future();
        if let Err(mpsc::error::SendError(mut action)) = self.tx.send(action) {
            warn!(kind = %action.kind(), "executor closed; rejecting action");
            action.reject(DispatchError::ExecutorClosed);
        }
        future
    }

    /// `true` while a transport call is in flight.
    pub fn is_dispatching(&self) -> bool {
        self.dispatching.load(Ordering::Acquire)
    }
}

// ─── Scheduler ────────────────────────────────────────────────────────────

/// What one pass pulled off the queue head.
enum Run {
    Single(Action),
    Batch(Vec<Action>),
}

struct Scheduler<T> {
    queue: ActionQueue,
    rx: mpsc::UnboundedReceiver<Action>,
    transport: T,
    dispatching: Arc<AtomicBool>,
    batch_window: Duration,
}

impl<T: Transport> Scheduler<T> {
    async fn run(mut self) {
        while let Some(action) = self.rx.recv().await {
            self.queue.push(action);
            loop {
                self.wait_window().await;
                self.tick().await;
                self.absorb();
                if self.queue.is_empty() {
                    break;
                }
            }
        }
        debug!("all executor handles dropped; scheduler exiting");
    }

    /// Let the current burst of submissions land, then pull them in.
    async fn wait_window(&mut self) {
        if self.batch_window.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.batch_window).await;
        }
        self.absorb();
    }

    /// Move everything already sitting in the channel onto the queue.
    fn absorb(&mut self) {
        while let Ok(action) = self.rx.try_recv() {
            self.queue.push(action);
        }
    }

    /// One scheduling pass: pop a run from the head and dispatch it.
    async fn tick(&mut self) {
        if self
            .dispatching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if let Some(run) = self.next_run() {
            dispatch(&self.transport, run).await;
        }

        self.dispatching.store(false, Ordering::Release);
    }

    fn next_run(&mut self) -> Option<Run> {
        match self.queue.peek()?.kind() {
            ActionKind::Mutation => self.queue.pop().map(Run::Single),
            ActionKind::Query => {
                let mut run = Vec::new();
                while self.queue.peek().is_some_and(Action::is_query) {
                    run.extend(self.queue.pop());
                }
                if run.len() == 1 {
                    run.pop().map(Run::Single)
                } else {
                    Some(Run::Batch(run))
                }
            }
        }
    }
}

/// Send one run and settle its actions with the outcome.
async fn dispatch<T: Transport>(transport: &T, run: Run) {
    match run {
        Run::Single(mut action) => {
            debug!(kind = %action.kind(), "dispatching single action");
            let outcome = transport.send_one(&action).await;
            if let Err(e) = &outcome {
                warn!(kind = %action.kind(), error = %e, "action rejected");
            }
            action.settle(outcome);
        }
        Run::Batch(mut actions) => {
            debug!(size = actions.len(), "dispatching batched queries");
            match transport.send_batch(&actions).await {
                Ok(results) => {
                    let mut results = results.into_iter();
                    for (index, action) in actions.iter_mut().enumerate() {
                        let outcome = results
                            .next()
                            .unwrap_or(Err(DispatchError::MissingBatchEntry { index }));
                        action.settle(outcome);
                    }
                }
                Err(e) => {
                    warn!(size = actions.len(), error = %e, "batch rejected");
                    for action in &mut actions {
                        action.reject(e.clone());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// One transport call as observed by [`MockTransport`].
    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        One(String),
        Batch(Vec<String>),
    }

    /// Answers every query with `{"echo": <query text>}` and records calls.
    /// With a gate installed, each call waits for the gate to open.
    #[derive(Default)]
    struct MockTransport {
        calls: Mutex<Vec<Call>>,
        gate: Option<Arc<Notify>>,
        entered: Arc<Notify>,
        fail_one: Option<DispatchError>,
        fail_batch: Option<DispatchError>,
        short_batch: bool,
    }

    impl MockTransport {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        async fn enter(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
    }

    fn echo(action: &Action) -> Value {
        json!({ "echo": action.request().query })
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send_one(&self, action: &Action) -> Result<Value> {
            self.enter(Call::One(action.request().query.clone())).await;
            match &self.fail_one {
                Some(e) => Err(e.clone()),
                None => Ok(echo(action)),
            }
        }

        async fn send_batch(&self, actions: &[Action]) -> Result<Vec<Result<Value>>> {
            let texts = actions.iter().map(|a| a.request().query.clone()).collect();
            self.enter(Call::Batch(texts)).await;
            if let Some(e) = &self.fail_batch {
                return Err(e.clone());
            }
            let mut out: Vec<Result<Value>> = actions.iter().map(|a| Ok(echo(a))).collect();
            if self.short_batch {
                out.pop();
            }
            Ok(out)
        }
    }

    fn q(text: &str) -> Action {
        Action::query(text).unwrap()
    }

    fn m(text: &str) -> Action {
        Action::mutation(text).unwrap()
    }

    fn one(text: &str) -> Call {
        Call::One(text.into())
    }

    fn batch(texts: &[&str]) -> Call {
        Call::Batch(texts.iter().map(|t| t.to_string()).collect())
    }

    #[tokio::test]
    async fn resolves_single_action() {
        let transport = Arc::new(MockTransport::default());
        let executor = ActionExecutor::new(Arc::clone(&transport));

        let out = executor.execute(q("foobar")).await.unwrap();
        assert_eq!(out, json!({ "echo": "foobar" }));
        assert_eq!(transport.calls(), vec![one("foobar")]);
    }

    #[tokio::test]
    async fn rejects_single_action() {
        let transport = Arc::new(MockTransport {
            fail_one: Some(DispatchError::Protocol {
                message: "The Error".into(),
            }),
            ..Default::default()
        });
        let executor = ActionExecutor::new(Arc::clone(&transport));

        let err = executor.execute(q("foobar")).await.unwrap_err();
        assert_eq!(err.to_string(), "The Error");
    }

    #[tokio::test]
    async fn batches_queries_from_the_same_burst() {
        let transport = Arc::new(MockTransport::default());
        let executor = ActionExecutor::new(Arc::clone(&transport));

        let f1 = executor.execute(q("query { username }"));
        let f2 = executor.execute(q("query { username, age }"));

        assert_eq!(f1.await.unwrap()["echo"], "query { username }");
        assert_eq!(f2.await.unwrap()["echo"], "query { username, age }");
        assert_eq!(
            transport.calls(),
            vec![batch(&["query { username }", "query { username, age }"])]
        );
    }

    #[tokio::test]
    async fn mutations_are_sent_alone_in_arrival_order() {
        let transport = Arc::new(MockTransport::default());
        let executor = ActionExecutor::new(Arc::clone(&transport));

        let futures = vec![
            executor.execute(q("a")),
            executor.execute(q("b")),
            executor.execute(m("M1")),
            executor.execute(m("M2")),
            executor.execute(q("c")),
            executor.execute(m("M3")),
            executor.execute(q("d")),
            executor.execute(q("e")),
        ];
        for f in futures {
            f.await.unwrap();
        }

        assert_eq!(
            transport.calls(),
            vec![
                batch(&["a", "b"]),
                one("M1"),
                one("M2"),
                one("c"),
                one("M3"),
                batch(&["d", "e"]),
            ]
        );
    }

    #[tokio::test]
    async fn no_dispatch_overlaps_an_inflight_one() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(MockTransport {
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        let executor = ActionExecutor::new(Arc::clone(&transport));

        let first = executor.execute(m("M1"));
        transport.entered.notified().await;
        assert!(executor.is_dispatching());

        let second = executor.execute(q("a"));
        let third = executor.execute(q("b"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.calls(), vec![one("M1")]);
        assert!(second.peek().is_none());

        gate.notify_one();
        first.await.unwrap();

        transport.entered.notified().await;
        gate.notify_one();
        second.await.unwrap();
        third.await.unwrap();

        assert_eq!(transport.calls(), vec![one("M1"), batch(&["a", "b"])]);
    }

    #[tokio::test]
    async fn batch_failure_rejects_every_member() {
        let transport = Arc::new(MockTransport {
            fail_batch: Some(DispatchError::UnknownHttp { status: 537 }),
            ..Default::default()
        });
        let executor = ActionExecutor::new(Arc::clone(&transport));

        let f1 = executor.execute(q("a"));
        let f2 = executor.execute(q("b"));
        assert!(matches!(f1.await, Err(DispatchError::UnknownHttp { status: 537 })));
        assert!(matches!(f2.await, Err(DispatchError::UnknownHttp { status: 537 })));
    }

    #[tokio::test]
    async fn failure_stays_local_and_queue_keeps_draining() {
        let transport = Arc::new(MockTransport {
            fail_batch: Some(DispatchError::Protocol {
                message: "boom".into(),
            }),
            ..Default::default()
        });
        let executor = ActionExecutor::new(Arc::clone(&transport));

        let batched = [executor.execute(q("a")), executor.execute(q("b"))];
        let after = executor.execute(m("M1"));

        for f in batched {
            assert!(f.await.is_err());
        }
        assert_eq!(after.await.unwrap()["echo"], "M1");
    }

    #[tokio::test]
    async fn short_batch_response_rejects_the_missing_entry() {
        let transport = Arc::new(MockTransport {
            short_batch: true,
            ..Default::default()
        });
        let executor = ActionExecutor::new(Arc::clone(&transport));

        let f1 = executor.execute(q("a"));
        let f2 = executor.execute(q("b"));
        assert_eq!(f1.await.unwrap()["echo"], "a");
        assert!(matches!(
            f2.await,
            Err(DispatchError::MissingBatchEntry { index: 1 })
        ));
    }

    #[tokio::test]
    async fn zero_window_still_batches_a_synchronous_burst() {
        let transport = Arc::new(MockTransport::default());
        let executor = ActionExecutor::with_batch_window(Arc::clone(&transport), Duration::ZERO);

        let futures: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|t| executor.execute(q(t)))
            .collect();
        for f in futures {
            f.await.unwrap();
        }
        assert_eq!(transport.calls(), vec![batch(&["a", "b", "c"])]);
    }

    #[tokio::test]
    async fn goes_idle_and_wakes_on_next_execute() {
        let transport = Arc::new(MockTransport::default());
        let executor = ActionExecutor::new(Arc::clone(&transport));

        executor.execute(q("a")).await.unwrap();
        assert!(!executor.is_dispatching());
        executor.execute(m("M1")).await.unwrap();

        assert_eq!(transport.calls(), vec![one("a"), one("M1")]);
    }

    #[tokio::test]
    async fn dropping_the_executor_still_drains_submitted_actions() {
        let transport = Arc::new(MockTransport::default());
        let executor = ActionExecutor::new(Arc::clone(&transport));

        let f = executor.execute(q("a"));
        drop(executor);
        assert_eq!(f.await.unwrap()["echo"], "a");
    }

    #[test]
    fn execute_after_scheduler_is_gone_rejects() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let executor = rt.block_on(async { ActionExecutor::new(MockTransport::default()) });
        drop(rt);

        let f = executor.execute(q("a"));
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        assert!(matches!(rt.block_on(f), Err(DispatchError::ExecutorClosed)));
    }
}
