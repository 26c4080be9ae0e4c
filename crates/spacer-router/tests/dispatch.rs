mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use spacer_router::{ConsumerLoop, RouterError};
use tokio_util::sync::CancellationToken;

use common::{inbound, route_table, ScriptedInvoker, ScriptedSource, DELEGATOR};

async fn run_to_completion(
    source: ScriptedSource,
    invoker: Arc<ScriptedInvoker>,
    cancel: CancellationToken,
) {
    let consumer = ConsumerLoop::new(source, invoker, route_table());
    tokio::time::timeout(Duration::from_secs(5), consumer.run(cancel))
        .await
        .expect("consumer loop did not stop")
        .expect("consumer loop failed");
}

#[tokio::test]
async fn routed_message_reaches_handler_unchanged() {
    let cancel = CancellationToken::new();
    let payload = br#"{"stash":"x1","items":[{"id":"a"}],"note":"  spaced  "}"#;
    let source = ScriptedSource::new(
        vec![inbound("PoESocial_stat", 0, 10, payload)],
        cancel.clone(),
    );
    let invoker = Arc::new(ScriptedInvoker::default());

    run_to_completion(source, Arc::clone(&invoker), cancel).await;

    let calls = invoker.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, format!("{DELEGATOR}/get_stashes"));
    assert_eq!(calls[0].1, Bytes::copy_from_slice(payload));
}

#[tokio::test]
async fn commit_follows_successful_invocation_only() {
    let cancel = CancellationToken::new();
    let source = ScriptedSource::new(
        vec![
            inbound("PoESocial_stat", 0, 1, b"{}"),
            inbound("PoESocial_stat", 0, 2, b"{}"),
        ],
        cancel.clone(),
    );
    let commits = Arc::clone(&source.commits);
    let invoker = Arc::new(ScriptedInvoker::default());

    run_to_completion(source, Arc::clone(&invoker), cancel).await;

    assert_eq!(invoker.calls.lock().len(), 2);
    assert_eq!(
        *commits.lock(),
        vec![
            ("PoESocial_stat".to_string(), 0, 2),
            ("PoESocial_stat".to_string(), 0, 3),
        ]
    );
}

#[tokio::test]
async fn failed_invocations_are_redelivered_until_success() {
    const FAILURES: usize = 3;
    let cancel = CancellationToken::new();
    let source = ScriptedSource::new(
        vec![inbound("PoESocial_stat", 2, 40, b"{\"n\":1}")],
        cancel.clone(),
    );
    let commits = Arc::clone(&source.commits);
    let rewinds = Arc::clone(&source.rewinds);
    let invoker = Arc::new(ScriptedInvoker::failing(FAILURES));

    run_to_completion(source, Arc::clone(&invoker), cancel).await;

    assert_eq!(invoker.calls.lock().len(), FAILURES + 1);
    assert_eq!(*rewinds.lock(), vec![40; FAILURES]);
    assert_eq!(*commits.lock(), vec![("PoESocial_stat".to_string(), 2, 41)]);
}

#[tokio::test]
async fn unrouted_message_is_skipped_without_blocking() {
    let cancel = CancellationToken::new();
    let source = ScriptedSource::new(
        vec![
            inbound("PoESocial_unknown", 0, 5, b"{}"),
            inbound("PoESocial_stat", 0, 6, b"{}"),
        ],
        cancel.clone(),
    );
    let commits = Arc::clone(&source.commits);
    let invoker = Arc::new(ScriptedInvoker::default());

    run_to_completion(source, Arc::clone(&invoker), cancel).await;

    let calls = invoker.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, format!("{DELEGATOR}/get_stashes"));
    assert_eq!(*commits.lock(), vec![("PoESocial_stat".to_string(), 0, 7)]);
}

#[tokio::test]
async fn failed_rewind_stops_the_loop_without_committing_past() {
    let cancel = CancellationToken::new();
    let source = ScriptedSource::new(
        vec![
            inbound("PoESocial_stat", 0, 10, b"{\"n\":10}"),
            inbound("PoESocial_stat", 0, 11, b"{\"n\":11}"),
        ],
        cancel.clone(),
    )
    .with_failing_rewind();
    let commits = Arc::clone(&source.commits);
    let invoker = Arc::new(ScriptedInvoker::failing(1));

    let consumer = ConsumerLoop::new(source, invoker.clone(), route_table());
    let err = tokio::time::timeout(Duration::from_secs(5), consumer.run(cancel))
        .await
        .expect("consumer loop did not stop")
        .unwrap_err();

    assert!(matches!(err, RouterError::Broker(_)));
    assert!(err.is_fatal());
    assert_eq!(invoker.calls.lock().len(), 1);
    assert!(commits.lock().is_empty());
}
