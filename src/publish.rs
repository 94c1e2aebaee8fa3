// src/publish.rs

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::future::Future;
use tracing::{error, info, warn};

use crate::broker::Publisher;
use crate::error::PublishError;
use crate::table::Table;

/// Sample one row uniformly, serialize it and hand it to `publisher`.
/// Returns the JSON text that was sent.
pub async fn publish_once<P, R>(
    publisher: &P,
    table: &Table,
    queue_name: &str,
    rng: &mut R,
) -> Result<String, PublishError>
where
    P: Publisher + ?Sized,
    R: Rng,
{
    if table.is_empty() {
        return Err(PublishError::EmptyTable);
    }
    let record = table
        .row(rng.gen_range(0..table.len()))
        .ok_or(PublishError::EmptyTable)?;

    // serde_json writes non-ASCII as-is
    let message = serde_json::to_string(&record)?;
    publisher.publish(queue_name, message.as_bytes()).await?;

    info!("[x] Sent: {}", message);
    Ok(message)
}

/// Publish until `shutdown` resolves, then close `publisher` exactly once.
///
/// Per-message failures are logged and the loop moves on. Returns the number
/// of messages sent.
pub async fn run<P, F>(publisher: &P, table: &Table, queue_name: &str, shutdown: F) -> u64
where
    P: Publisher + ?Sized,
    F: Future<Output = ()>,
{
    let mut rng = StdRng::from_entropy();
    let mut sent = 0u64;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
            result = publish_once(publisher, table, queue_name, &mut rng) => match result {
                Ok(_) => sent += 1,
                // TODO: stop the loop here once reconnecting is supported; retrying a dead link spins.
                Err(e) if e.is_connection_lost() => {
                    error!(error = %e, "broker connection lost");
                }
                Err(e) => warn!(error = %e, "publish failed"),
            },
        }
        // lets the runtime deliver the signal between sends
        tokio::task::yield_now().await;
    }

    if let Err(e) = publisher.close().await {
        error!(error = %e, "closing broker channel failed");
    }
    info!(sent, "publisher stopped");
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    fn two_rows() -> Table {
        Table::from_raw(s(&["id", "name"]), vec![s(&["1", "A"]), s(&["2", "B"])]).unwrap()
    }

    /// Keeps every payload; optionally fails (`lost` picks a dead-link error),
    /// optionally fires `trigger` after a given number of publish attempts.
    #[derive(Default)]
    struct CapturingPublisher {
        sent: Mutex<Vec<(String, String)>>,
        attempts: AtomicUsize,
        closes: AtomicUsize,
        fail: bool,
        lost: bool,
        trigger: Mutex<Option<(usize, oneshot::Sender<()>)>>,
    }

    impl CapturingPublisher {
        fn interrupt_after(n: usize, fail: bool) -> (Self, oneshot::Receiver<()>) {
            let (tx, rx) = oneshot::channel();
            let publisher = Self {
                fail,
                trigger: Mutex::new(Some((n, tx))),
                ..Default::default()
            };
            (publisher, rx)
        }

        fn payloads(&self) -> Vec<Value> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, body)| serde_json::from_str(body).unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl Publisher for CapturingPublisher {
        async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            {
                let mut trigger = self.trigger.lock().unwrap();
                if matches!(trigger.as_ref(), Some((n, _)) if *n == attempt) {
                    if let Some((_, tx)) = trigger.take() {
                        let _ = tx.send(());
                    }
                }
            }
            if self.lost {
                let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
                return Err(PublishError::Broker(lapin::Error::IOError(Arc::new(io))));
            }
            if self.fail {
                let err = serde_json::from_str::<Value>("{").unwrap_err();
                return Err(PublishError::Serialize(err));
            }
            self.sent.lock().unwrap().push((
                routing_key.to_string(),
                String::from_utf8(payload.to_vec()).unwrap(),
            ));
            Ok(())
        }

        async fn close(&self) -> Result<(), PublishError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_message_keys_match_columns() {
        let table = Table::from_latin1_csv(b"z;id;name\nx;1;A\ny;2;B\n").unwrap();
        let publisher = CapturingPublisher::default();
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..10 {
            publish_once(&publisher, &table, "votes", &mut rng)
                .await
                .unwrap();
        }

        for payload in publisher.payloads() {
            let keys: Vec<&String> = payload.as_object().unwrap().keys().collect();
            assert_eq!(keys, table.columns().iter().collect::<Vec<_>>());
        }
        assert!(publisher
            .sent
            .lock()
            .unwrap()
            .iter()
            .all(|(key, _)| key == "votes"));
    }

    #[tokio::test]
    async fn test_single_row_always_same_message() {
        let table = Table::from_raw(s(&["id", "name"]), vec![s(&["7", "only"])]).unwrap();
        let publisher = CapturingPublisher::default();
        let mut rng = StdRng::seed_from_u64(2);

        let first = publish_once(&publisher, &table, "q", &mut rng).await.unwrap();
        for _ in 0..50 {
            let next = publish_once(&publisher, &table, "q", &mut rng).await.unwrap();
            assert_eq!(next, first);
        }
        assert_eq!(first, r#"{"id":7,"name":"only"}"#);
    }

    #[tokio::test]
    async fn test_non_ascii_is_not_escaped() {
        let table = Table::from_latin1_csv(b"drink\ncaf\xe9\n").unwrap();
        let publisher = CapturingPublisher::default();
        let mut rng = StdRng::seed_from_u64(3);

        let message = publish_once(&publisher, &table, "q", &mut rng).await.unwrap();

        assert!(message.contains("café"));
        assert!(!message.contains("\\u"));
        let parsed: Value = serde_json::from_str(&message).unwrap();
        assert_eq!(parsed, json!({"drink": "café"}));
    }

    #[tokio::test]
    async fn test_hundred_sends_cover_both_rows() {
        let table = two_rows();
        let publisher = CapturingPublisher::default();
        let mut rng = StdRng::seed_from_u64(42);
        let a = json!({"id": 1, "name": "A"});
        let b = json!({"id": 2, "name": "B"});

        for _ in 0..100 {
            publish_once(&publisher, &table, "q", &mut rng).await.unwrap();
        }

        let payloads = publisher.payloads();
        assert_eq!(payloads.len(), 100);
        assert!(payloads.iter().all(|p| *p == a || *p == b));
        assert!(payloads.contains(&a));
        assert!(payloads.contains(&b));
    }

    #[tokio::test]
    async fn test_empty_table_is_recoverable_error() {
        let table = Table::from_raw(s(&["id"]), vec![]).unwrap();
        let publisher = CapturingPublisher::default();
        let mut rng = StdRng::seed_from_u64(4);

        let err = publish_once(&publisher, &table, "q", &mut rng)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::EmptyTable));
        assert_eq!(publisher.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_interrupt_stops_publishing_and_closes_once() {
        let table = two_rows();
        let (publisher, rx) = CapturingPublisher::interrupt_after(5, false);

        let sent = run(&publisher, &table, "q", async {
            let _ = rx.await;
        })
        .await;

        assert_eq!(sent, 5);
        assert_eq!(publisher.attempts.load(Ordering::SeqCst), 5);
        assert_eq!(publisher.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_loop() {
        let table = two_rows();
        let (publisher, rx) = CapturingPublisher::interrupt_after(3, true);

        let sent = run(&publisher, &table, "q", async {
            let _ = rx.await;
        })
        .await;

        assert_eq!(sent, 0);
        assert_eq!(publisher.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(publisher.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lost_connection_keeps_looping_until_interrupt() {
        let table = two_rows();
        let (mut publisher, rx) = CapturingPublisher::interrupt_after(4, false);
        publisher.lost = true;

        let sent = run(&publisher, &table, "q", async {
            let _ = rx.await;
        })
        .await;

        assert_eq!(sent, 0);
        assert_eq!(publisher.attempts.load(Ordering::SeqCst), 4);
        assert_eq!(publisher.closes.load(Ordering::SeqCst), 1);
        assert!(publisher.sent.lock().unwrap().is_empty());
    }
}
