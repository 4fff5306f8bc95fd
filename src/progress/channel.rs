use super::events::Event;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Creates the transport for one download session.
///
/// Status events flow from the [`WorkerLink`] to the [`ConsumerLink`]; the
/// terminate signal flows the other way. Both directions are unbounded FIFO
/// queues, so neither side ever waits on a send.
pub fn channel() -> (WorkerLink, ConsumerLink) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let worker = WorkerLink {
        events: event_tx,
        control: control_rx,
        terminated: false,
    };
    let consumer = ConsumerLink {
        events: event_rx,
        control: control_tx,
    };
    (worker, consumer)
}

/// Producer end, owned by the worker's execution context.
#[derive(Debug)]
pub struct WorkerLink {
    events: UnboundedSender<Event>,
    control: UnboundedReceiver<Event>,
    terminated: bool,
}

impl WorkerLink {
    /// Enqueues `event` for the consumer. Returns `false` once the consumer is gone.
    pub fn send(&self, event: Event) -> bool {
        self.events.send(event).is_ok()
    }

    /// Non-blocking check for a pending terminate request.
    ///
    /// Stays `true` once observed. A dropped consumer counts as a request.
    pub fn terminate_requested(&mut self) -> bool {
        while !self.terminated {
            match self.control.try_recv() {
                Ok(Event::Terminate) | Err(TryRecvError::Disconnected) => self.terminated = true,
                Ok(_) => continue,
                Err(TryRecvError::Empty) => break,
            }
        }
        self.terminated
    }

    /// Resolves when a terminate request arrives. Cancel safe, so it can sit in
    /// a `tokio::select!` next to the worker's own I/O.
    pub async fn terminated(&mut self) {
        while !self.terminated {
            match self.control.recv().await {
                Some(Event::Terminate) | None => self.terminated = true,
                Some(_) => continue,
            }
        }
    }
}

/// Result of a non-blocking read on the consumer end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Event(Event),
    Empty,
    /// The worker end has been dropped and every queued event was read.
    Disconnected,
}

/// Consumer end, owned by the foreground loop.
#[derive(Debug)]
pub struct ConsumerLink {
    events: UnboundedReceiver<Event>,
    control: UnboundedSender<Event>,
}

impl ConsumerLink {
    /// Returns the oldest pending event without blocking.
    pub fn try_receive(&mut self) -> Received {
        match self.events.try_recv() {
            Ok(event) => Received::Event(event),
            Err(TryRecvError::Empty) => Received::Empty,
            Err(TryRecvError::Disconnected) => Received::Disconnected,
        }
    }

    /// Enqueues the terminate signal for the worker. Returns `false` if the
    /// worker end is already gone.
    pub fn send_terminate(&self) -> bool {
        self.control.send(Event::Terminate).is_ok()
    }

    /// A detached handle that can deliver the terminate signal on its own.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            control: self.control.clone(),
        }
    }
}

/// Carries the terminate signal across the channel boundary.
#[derive(Debug, Clone)]
pub struct CancelToken {
    control: UnboundedSender<Event>,
}

impl CancelToken {
    pub fn cancel(&self) -> bool {
        self.control.send(Event::Terminate).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_fifo_order_without_loss() {
        let (worker, mut consumer) = channel();
        let sent: Vec<Event> = (0..=50)
            .map(|i| match i % 3 {
                0 => Event::progress(i, 50),
                1 => Event::track_title(format!("Track {}", i)),
                _ => Event::eta_update("eta", i),
            })
            .collect();

        let producer = std::thread::spawn({
            let sent = sent.clone();
            move || {
                for event in sent {
                    assert!(worker.send(event));
                }
            }
        });
        producer.join().unwrap();

        let mut received = Vec::new();
        loop {
            match consumer.try_receive() {
                Received::Event(event) => received.push(event),
                Received::Empty => panic!("producer finished, queue should drain to disconnect"),
                Received::Disconnected => break,
            }
        }
        assert_eq!(received, sent);
    }

    #[test]
    fn empty_read_does_not_block() {
        let (_worker, mut consumer) = channel();
        assert_eq!(consumer.try_receive(), Received::Empty);
    }

    #[test]
    fn terminate_is_sticky() {
        let (mut worker, consumer) = channel();
        assert!(!worker.terminate_requested());
        assert!(consumer.send_terminate());
        assert!(worker.terminate_requested());
        assert!(worker.terminate_requested());
    }

    #[test]
    fn dropped_consumer_counts_as_terminate() {
        let (mut worker, consumer) = channel();
        drop(consumer);
        assert!(worker.terminate_requested());
        assert!(!worker.send(Event::progress(1, 2)));
    }

    #[test]
    fn cancel_token_reaches_worker() {
        let (mut worker, consumer) = channel();
        let token = consumer.cancel_token();
        assert!(token.cancel());
        assert!(worker.terminate_requested());
    }

    #[tokio::test]
    async fn terminated_resolves_on_request() {
        let (mut worker, consumer) = channel();
        consumer.send_terminate();
        worker.terminated().await;
        assert!(worker.terminate_requested());
    }
}
