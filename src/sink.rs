use crate::record::LogEvent;
use async_trait::async_trait;
use std::sync::Arc;

/// Destination for [`LogEvent`]s produced by the logging integration.
///
/// `handle` has no return value: a sink absorbs its own failures so that
/// nothing it does can disturb the code that logged the event.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Process a single event.
    ///
    /// Implementations must return normally whatever happens while
    /// processing, including network errors and timeouts.
    async fn handle(&self, event: &LogEvent);

    /// Whether `handle` would act on this event. Default: always.
    fn is_handling(&self, _event: &LogEvent) -> bool {
        true
    }

    /// Whether sinks after this one in a [`ChainSink`] still see an event
    /// this sink handled. Default: `true`.
    fn bubbles(&self) -> bool {
        true
    }
}

/// Runs several sinks in order.
///
/// A sink that handles an event and does not bubble stops the chain for
/// that event.
#[derive(Clone, Default)]
pub struct ChainSink {
    sinks: Vec<Arc<dyn Sink>>,
}

impl ChainSink {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        ChainSink { sinks }
    }

    pub fn push(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl Sink for ChainSink {
    async fn handle(&self, event: &LogEvent) {
        for sink in &self.sinks {
            if !sink.is_handling(event) {
                continue;
            }
            sink.handle(event).await;
            if !sink.bubbles() {
                break;
            }
        }
    }

    fn is_handling(&self, event: &LogEvent) -> bool {
        self.sinks.iter().any(|s| s.is_handling(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        min: Level,
        bubble: bool,
        seen: AtomicUsize,
    }

    impl Counting {
        fn new(min: Level, bubble: bool) -> Arc<Self> {
            Arc::new(Counting { min, bubble, seen: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl Sink for Counting {
        async fn handle(&self, _event: &LogEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
        fn is_handling(&self, event: &LogEvent) -> bool {
            event.level >= self.min
        }
        fn bubbles(&self) -> bool {
            self.bubble
        }
    }

    #[tokio::test]
    async fn non_bubbling_sink_stops_chain() {
        let first = Counting::new(Level::Error, false);
        let second = Counting::new(Level::Debug, true);
        let chain = ChainSink::new(vec![first.clone() as Arc<dyn Sink>, second.clone()]);

        chain.handle(&LogEvent::new(Level::Error, "app", "stop here")).await;
        assert_eq!(first.seen.load(Ordering::SeqCst), 1);
        assert_eq!(second.seen.load(Ordering::SeqCst), 0);

        // Below the first sink's threshold the chain continues.
        chain.handle(&LogEvent::new(Level::Info, "app", "pass through")).await;
        assert_eq!(first.seen.load(Ordering::SeqCst), 1);
        assert_eq!(second.seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bubbling_sinks_all_run() {
        let first = Counting::new(Level::Error, true);
        let second = Counting::new(Level::Error, true);
        let chain = ChainSink::default().push(first.clone()).push(second.clone());

        chain.handle(&LogEvent::new(Level::Critical, "app", "x")).await;
        assert_eq!(first.seen.load(Ordering::SeqCst), 1);
        assert_eq!(second.seen.load(Ordering::SeqCst), 1);
        assert!(!chain.is_handling(&LogEvent::new(Level::Warning, "app", "x")));
    }
}
