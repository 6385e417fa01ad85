//! Producer/consumer fan-out: one producer thread pulls fused samples and
//! pushes them onto one bounded queue per consumer, each served by its own
//! thread. A slow consumer only ever loses samples off its own queue; it
//! never blocks the producer or any other consumer. Grounded on
//! `original_source`'s `DataStreamer`.

use crate::error::StreamerError;
use crate::fusion_stage::FusedSample;
use crossbeam::channel::{bounded, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;
use tracing::info;

/// Receives one fused sample at a time. Implementors must not block for
/// long: the streamer gives each consumer its own thread, but a consumer
/// that never returns will never see samples queued behind the one it's
/// stuck on.
pub trait Consumer: Send + 'static {
    fn consume(&mut self, sample: FusedSample);
}

impl<F: FnMut(FusedSample) + Send + 'static> Consumer for F {
    fn consume(&mut self, sample: FusedSample) {
        self(sample)
    }
}

type ConsumerId = u64;

struct ConsumerHandle {
    queue: Sender<Option<FusedSample>>,
    thread: JoinHandle<()>,
    thread_id: ThreadId,
}

struct Inner {
    consumers: HashMap<ConsumerId, ConsumerHandle>,
    next_id: ConsumerId,
    stopped: bool,
}

/// Cloneable handle for registering/deregistering consumers from another
/// thread (e.g. a TCP accept loop), without needing ownership of the
/// [`DataStreamer`] itself.
#[derive(Clone)]
pub struct StreamerHandle {
    inner: Arc<Mutex<Inner>>,
    max_queue_size: usize,
}

impl StreamerHandle {
    pub fn add_consumer<C: Consumer>(&self, consumer: C) -> Result<ConsumerId, StreamerError> {
        add_consumer(&self.inner, self.max_queue_size, consumer)
    }

    pub fn remove_consumer(&self, id: ConsumerId) {
        remove_consumer(&self.inner, id)
    }
}

/// Fans fused samples out to a dynamic set of consumers, each backed by a
/// bounded queue with a timed, drop-on-full put.
pub struct DataStreamer {
    inner: Arc<Mutex<Inner>>,
    max_queue_size: usize,
    consumer_timeout: Duration,
    producer: Option<JoinHandle<()>>,
}

impl DataStreamer {
    /// Spawn the producer thread, pulling samples from `source` until it
    /// is exhausted or [`DataStreamer::request_stop`] is called.
    pub fn spawn<I>(source: I, max_queue_size: usize, consumer_timeout: Duration) -> Self
    where
        I: Iterator<Item = FusedSample> + Send + 'static,
    {
        let inner = Arc::new(Mutex::new(Inner {
            consumers: HashMap::new(),
            next_id: 1,
            stopped: false,
        }));

        let producer_inner = Arc::clone(&inner);
        let producer = std::thread::spawn(move || {
            Self::run_producer(source, &producer_inner, consumer_timeout);
        });

        Self {
            inner,
            max_queue_size,
            consumer_timeout,
            producer: Some(producer),
        }
    }

    fn run_producer<I>(source: I, inner: &Arc<Mutex<Inner>>, consumer_timeout: Duration)
    where
        I: Iterator<Item = FusedSample>,
    {
        for sample in source {
            let stopped = { inner.lock().unwrap().stopped };
            if stopped {
                break;
            }
            let queues: Vec<Sender<Option<FusedSample>>> = {
                let guard = inner.lock().unwrap();
                guard.consumers.values().map(|c| c.queue.clone()).collect()
            };
            for queue in queues {
                let _ = queue.send_timeout(Some(sample), consumer_timeout);
            }
        }
        info!("fused sample source exhausted");

        let mut guard = inner.lock().unwrap();
        guard.stopped = true;
        let handles: Vec<ConsumerHandle> = guard.consumers.drain().map(|(_, h)| h).collect();
        drop(guard);
        for handle in handles {
            let _ = handle.queue.send(None);
            let _ = handle.thread.join();
        }
    }

    /// Register a new consumer, spawning a dedicated thread for it. Fails
    /// if [`DataStreamer::request_stop`] has already been called.
    pub fn add_consumer<C: Consumer>(&self, consumer: C) -> Result<ConsumerId, StreamerError> {
        add_consumer(&self.inner, self.max_queue_size, consumer)
    }

    /// Deregister and join a consumer. Drains any samples already queued
    /// for it before sending the termination marker, matching the
    /// upstream shutdown sequence for per-consumer fan-out sockets.
    pub fn remove_consumer(&self, id: ConsumerId) {
        remove_consumer(&self.inner, id)
    }

    /// A cloneable handle that can add/remove consumers from another
    /// thread without owning the streamer itself.
    pub fn handle(&self) -> StreamerHandle {
        StreamerHandle {
            inner: Arc::clone(&self.inner),
            max_queue_size: self.max_queue_size,
        }
    }

    /// Ask the producer to stop pulling new samples. Already-queued
    /// samples are still delivered before consumers are torn down.
    pub fn request_stop(&self) {
        self.inner.lock().unwrap().stopped = true;
    }

    /// Block until the producer and every remaining consumer thread have
    /// exited.
    pub fn wait_for_end(mut self) {
        if let Some(producer) = self.producer.take() {
            let _ = producer.join();
        }
    }
}

fn add_consumer<C: Consumer>(
    inner: &Arc<Mutex<Inner>>,
    max_queue_size: usize,
    mut consumer: C,
) -> Result<ConsumerId, StreamerError> {
    let mut guard = inner.lock().unwrap();
    if guard.stopped {
        return Err(StreamerError::AlreadyStopped);
    }
    let (tx, rx) = bounded::<Option<FusedSample>>(max_queue_size);
    let id = guard.next_id;
    guard.next_id += 1;

    let thread = std::thread::spawn(move || {
        while let Ok(Some(sample)) = rx.recv() {
            let result =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| consumer.consume(sample)));
            if result.is_err() {
                tracing::error!("consumer panicked handling a sample; continuing");
            }
        }
        info!(consumer_id = id, "consumer stopped");
    });
    let thread_id = thread.thread().id();

    guard.consumers.insert(
        id,
        ConsumerHandle {
            queue: tx,
            thread,
            thread_id,
        },
    );
    info!(consumer_id = id, "added new consumer");
    Ok(id)
}

/// Deregister a consumer. If called from the consumer's own worker thread
/// (the self-removal path a consumer takes on a send/write failure), the
/// terminal marker is still sent but the thread is not joined — joining
/// here would be the thread waiting on its own completion and would
/// deadlock forever.
fn remove_consumer(inner: &Arc<Mutex<Inner>>, id: ConsumerId) {
    let handle = {
        let mut guard = inner.lock().unwrap();
        guard.consumers.remove(&id)
    };
    let Some(handle) = handle else { return };
    while handle.queue.try_recv().is_ok() {}
    let _ = handle.queue.send(None);
    let blocking = std::thread::current().id() != handle.thread_id;
    info!(consumer_id = id, blocking, "removing consumer");
    if blocking {
        let _ = handle.thread.join();
    }
}
