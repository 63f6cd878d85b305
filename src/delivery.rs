//! Per-user delivery channel
//!
//! The room actor holds a [`DeliverySender`] for every member; the member's
//! connection task drains the matching [`DeliveryChannel`]. Delivery is best
//! effort: a recipient that does not drain in time loses the frame, the room
//! never waits on it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::model::{Message, User};

/// Frames buffered per recipient before deliveries start to wait
pub const DELIVERY_BUFFER: usize = 32;

/// Outbound event pushed by a room to one member
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A chat message
    Message(Message),
    /// Full roster of the room
    Roster(Vec<User>),
    /// History snapshot filtered for the recipient
    Log(Vec<Message>),
    /// The membership was taken over by a newer connection
    Close,
}

/// Result of one delivery attempt
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Frame is in the recipient's buffer
    Queued,
    /// Buffer was full or older frames are still waiting; a bounded-wait
    /// send is in flight
    Pending,
    /// Recipient already went away
    Closed,
}

/// Create a connected sender/receiver pair
pub fn channel() -> (DeliverySender, DeliveryChannel) {
    let (frames_tx, frames_rx) = mpsc::channel(DELIVERY_BUFFER);
    let (kick_tx, kick_rx) = oneshot::channel();

    (
        DeliverySender {
            frames: frames_tx,
            kick: kick_tx,
            backlog: None,
        },
        DeliveryChannel {
            frames: frames_rx,
            kick: Some(kick_rx),
            kicked: false,
        },
    )
}

/// Room-side half of a delivery channel
#[derive(Debug)]
pub struct DeliverySender {
    frames: mpsc::Sender<Frame>,
    kick: oneshot::Sender<()>,
    /// Fires when the newest bounded-wait send has finished
    backlog: Option<oneshot::Receiver<()>>,
}

impl DeliverySender {
    /// Deliver a frame without ever blocking the caller
    ///
    /// Frames go straight into the recipient's buffer while it has room and
    /// nothing older is waiting. Otherwise the send moves to a background task
    /// chained behind the previous one, so a recipient sees frames in the
    /// order they were delivered. Each frame waits at most `timeout` from this
    /// call; on expiry it is dropped and `dropped` is incremented.
    pub fn deliver(&mut self, frame: Frame, timeout: Duration, dropped: &Arc<AtomicU64>) -> Delivery {
        if let Some(backlog) = self.backlog.as_mut() {
            match backlog.try_recv() {
                Err(TryRecvError::Empty) => return self.defer(frame, timeout, dropped),
                Ok(()) | Err(TryRecvError::Closed) => self.backlog = None,
            }
        }

        match self.frames.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
            Err(TrySendError::Full(frame)) => self.defer(frame, timeout, dropped),
        }
    }

    /// Queue a bounded-wait send behind any send still in flight
    fn defer(&mut self, frame: Frame, timeout: Duration, dropped: &Arc<AtomicU64>) -> Delivery {
        let deadline = Instant::now() + timeout;
        let previous = self.backlog.take();
        let (done_tx, done_rx) = oneshot::channel();
        self.backlog = Some(done_rx);

        let frames = self.frames.clone();
        let dropped = Arc::clone(dropped);
        tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match frames.send_timeout(frame, remaining).await {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(frame)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    warn!("Delivery timed out, dropping {:?} frame", FrameKind::of(&frame));
                }
                Err(SendTimeoutError::Closed(_)) => {
                    debug!("Recipient closed while delivery was pending");
                }
            }
            let _ = done_tx.send(());
        });
        Delivery::Pending
    }

    /// Force the receiving connection to close
    ///
    /// The receiver yields [`Frame::Close`] ahead of anything still buffered.
    pub fn close(self) {
        let _ = self.kick.send(());
    }
}

/// Connection-side half of a delivery channel
#[derive(Debug)]
pub struct DeliveryChannel {
    frames: mpsc::Receiver<Frame>,
    kick: Option<oneshot::Receiver<()>>,
    kicked: bool,
}

impl DeliveryChannel {
    /// Wait for the next frame
    ///
    /// Returns `Some(Frame::Close)` once when the membership is taken over,
    /// and `None` after that or once the room has released the membership
    /// and every buffered frame was drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        if self.kicked {
            return None;
        }

        if let Some(kick) = self.kick.as_mut() {
            tokio::select! {
                biased;
                res = kick => {
                    self.kick = None;
                    if res.is_ok() {
                        self.kicked = true;
                        self.frames.close();
                        return Some(Frame::Close);
                    }
                    // Membership released without a kick; drain what is left
                }
                frame = self.frames.recv() => return frame,
            }
        }

        self.frames.recv().await
    }
}

/// Frame kind without its payload, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Message,
    Roster,
    Log,
    Close,
}

impl FrameKind {
    fn of(frame: &Frame) -> Self {
        match frame {
            Frame::Message(_) => FrameKind::Message,
            Frame::Roster(_) => FrameKind::Roster,
            Frame::Log(_) => FrameKind::Log,
            Frame::Close => FrameKind::Close,
        }
    }
}
