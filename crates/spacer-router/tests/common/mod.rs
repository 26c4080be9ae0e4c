#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use spacer_router::invoke::InvokeError;
use spacer_router::route::RouteSpec;
use spacer_router::{
    InboundMessage, Invoker, Message, MessageSource, PublishError, Publisher, RouteTable,
    RouterError, RouterResult, SourceEvent,
};
use tokio_util::sync::CancellationToken;

pub const APP: &str = "PoESocial";
pub const DELEGATOR: &str = "http://delegator:8080";

pub fn route_table() -> Arc<RouteTable> {
    let mut apps = BTreeMap::new();
    apps.insert(APP.to_string(), vec![RouteSpec::update("stat", "get_stashes")]);
    Arc::new(RouteTable::build(&apps, DELEGATOR).expect("route table"))
}

pub fn inbound(topic: &str, partition: i32, offset: i64, value: &[u8]) -> InboundMessage {
    InboundMessage {
        topic: topic.to_string(),
        partition,
        offset,
        key: None,
        value: Some(Bytes::copy_from_slice(value)),
    }
}

/// Replays a fixed list of messages. A rewind puts the message back at the
/// front unless the source was built to fail seeks; once the queue is empty
/// the source cancels the loop.
pub struct ScriptedSource {
    queue: Arc<Mutex<VecDeque<InboundMessage>>>,
    pub commits: Arc<Mutex<Vec<(String, i32, i64)>>>,
    pub rewinds: Arc<Mutex<Vec<i64>>>,
    cancel: CancellationToken,
    fail_rewind: bool,
}

impl ScriptedSource {
    pub fn new(messages: Vec<InboundMessage>, cancel: CancellationToken) -> Self {
        Self {
            queue: Arc::new(Mutex::new(messages.into())),
            commits: Arc::default(),
            rewinds: Arc::default(),
            cancel,
            fail_rewind: false,
        }
    }

    pub fn with_failing_rewind(mut self) -> Self {
        self.fail_rewind = true;
        self
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn poll(&mut self) -> RouterResult<SourceEvent> {
        let next = self.queue.lock().pop_front();
        match next {
            Some(msg) => Ok(SourceEvent::Message(msg)),
            None => {
                self.cancel.cancel();
                Ok(SourceEvent::Idle)
            }
        }
    }

    fn commit(&self, msg: &InboundMessage) -> RouterResult<()> {
        self.commits
            .lock()
            .push((msg.topic.clone(), msg.partition, msg.commit_offset()));
        Ok(())
    }

    fn rewind(&self, msg: &InboundMessage) -> RouterResult<()> {
        if self.fail_rewind {
            return Err(RouterError::Broker("seek timed out".into()));
        }
        self.rewinds.lock().push(msg.offset);
        self.queue.lock().push_front(msg.clone());
        Ok(())
    }
}

/// Records every call and fails the first `failures` of them.
#[derive(Default)]
pub struct ScriptedInvoker {
    failures: AtomicUsize,
    pub calls: Mutex<Vec<(String, Bytes)>>,
}

impl ScriptedInvoker {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            calls: Mutex::default(),
        }
    }
}

#[async_trait]
impl Invoker for ScriptedInvoker {
    async fn invoke(&self, url: &str, payload: Bytes) -> Result<(), InvokeError> {
        self.calls.lock().push((url.to_string(), payload));
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(InvokeError::Status(503));
        }
        Ok(())
    }
}

/// Publisher that keeps every message it is given.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Arc<Mutex<Vec<Message>>>,
}

impl Publisher for RecordingPublisher {
    fn publish(&self, msg: &Message) -> Result<(), PublishError> {
        self.published.lock().push(msg.clone());
        Ok(())
    }
}
