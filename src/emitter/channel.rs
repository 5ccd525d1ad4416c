//! Bounded queue between the engine and a slow consumer.
//!
//! [`channel`] returns a [`ChannelSubscriber`] to register with an
//! [`Emitter`](super::Emitter) and an [`EventReceiver`] for the consumer,
//! typically on another thread. What happens when the queue is full is
//! chosen with [`OverflowPolicy`]:
//!
//! - [`OverflowPolicy::Block`]: the engine waits for the consumer.
//! - [`OverflowPolicy::DropOldest`]: the oldest queued event is discarded
//!   to make room and the loss is reported in the terminal event.
//!
//! A whole duplicate set travels as one [`LintEvent::Set`], so dropping
//! never splits a set. The terminal [`LintEvent::Finished`] is never
//! dropped. If the receiver is gone, events are discarded silently.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};

use super::{LintElement, LintSubscriber, RunOutcome};
use crate::duplicates::{DirectoryGroup, RunState};
use crate::scanner::Warning;

/// Behaviour of a full queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Wait until the consumer makes room.
    #[default]
    Block,
    /// Discard the oldest queued event.
    DropOldest,
}

/// Event carried by the queue.
#[derive(Debug, Clone)]
pub enum LintEvent {
    /// State transition.
    State {
        /// Previous state
        from: RunState,
        /// New state
        to: RunState,
    },
    /// All elements of one resolved set, original first.
    Set(Vec<LintElement>),
    /// A group of equal directories.
    DirectoryGroup(DirectoryGroup),
    /// Terminal event.
    Finished {
        /// Result of the run
        outcome: Arc<RunOutcome>,
        /// Events discarded because the queue was full
        dropped: usize,
    },
}

impl LintEvent {
    /// Whether this is the terminal event.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

/// Create a bounded event queue.
///
/// `capacity` is clamped to at least one.
#[must_use]
pub fn channel(capacity: usize, policy: OverflowPolicy) -> (ChannelSubscriber, EventReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    let subscriber = ChannelSubscriber {
        tx,
        drain: (policy == OverflowPolicy::DropOldest).then(|| rx.clone()),
        policy,
        dropped: 0,
        disconnected: false,
    };
    (subscriber, EventReceiver { rx })
}

/// Engine side of the queue.
#[derive(Debug)]
pub struct ChannelSubscriber {
    tx: Sender<LintEvent>,
    // DropOldest only: pops the oldest queued event when full
    drain: Option<Receiver<LintEvent>>,
    policy: OverflowPolicy,
    dropped: usize,
    disconnected: bool,
}

impl ChannelSubscriber {
    /// Events discarded so far.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn push(&mut self, event: LintEvent) {
        if self.disconnected {
            return;
        }
        match self.policy {
            OverflowPolicy::Block => {
                if self.tx.send(event).is_err() {
                    self.mark_disconnected();
                }
            }
            OverflowPolicy::DropOldest => self.push_dropping(event),
        }
    }

    /// Whether the consumer dropped its receiver. Under `DropOldest` the
    /// drain keeps one receiver alive, so the sender never disconnects.
    fn consumer_gone(&self) -> bool {
        let own = usize::from(self.drain.is_some());
        self.tx.receiver_count() <= own
    }

    /// Discard queued events until one slot is free.
    fn make_room(&mut self) {
        let Some(drain) = &self.drain else {
            return;
        };
        while self.tx.is_full() {
            match drain.try_recv() {
                Ok(old) => {
                    self.dropped += 1;
                    log::debug!("Event queue full, dropped {:?}", EventKind::of(&old));
                }
                Err(_) => break,
            }
        }
    }

    fn push_dropping(&mut self, mut event: LintEvent) {
        if self.consumer_gone() {
            self.mark_disconnected();
            return;
        }
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Disconnected(_)) => {
                    self.mark_disconnected();
                    return;
                }
                Err(TrySendError::Full(returned)) => {
                    event = returned;
                    let Some(drain) = &self.drain else {
                        return;
                    };
                    match drain.try_recv() {
                        Ok(old) => {
                            self.dropped += 1;
                            log::debug!("Event queue full, dropped {:?}", EventKind::of(&old));
                        }
                        // the consumer emptied a slot in the meantime
                        Err(TryRecvError::Empty) => {}
                        Err(TryRecvError::Disconnected) => {
                            self.mark_disconnected();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn mark_disconnected(&mut self) {
        log::debug!("Event receiver dropped; discarding further events");
        self.disconnected = true;
    }
}

impl LintSubscriber for ChannelSubscriber {
    fn on_state_changed(&mut self, from: RunState, to: RunState) {
        self.push(LintEvent::State { from, to });
    }

    fn on_element_added(&mut self, element: &LintElement) {
        self.push(LintEvent::Set(vec![element.clone()]));
    }

    fn on_set_resolved(&mut self, elements: &[LintElement]) {
        self.push(LintEvent::Set(elements.to_vec()));
    }

    fn on_directory_group(&mut self, group: &DirectoryGroup) {
        self.push(LintEvent::DirectoryGroup(group.clone()));
    }

    fn on_finished(&mut self, outcome: &RunOutcome) {
        if self.disconnected {
            return;
        }
        // the slot for the terminal event is freed before the loss is counted
        if self.policy == OverflowPolicy::DropOldest {
            if self.consumer_gone() {
                self.mark_disconnected();
                return;
            }
            self.make_room();
        }
        let mut outcome = outcome.clone();
        if self.dropped > 0 {
            log::warn!("{} events were dropped by a full subscriber queue", self.dropped);
            if let Ok(summary) = &mut outcome {
                summary.warnings.push(Warning::general(format!(
                    "{} events were dropped because the consumer queue was full",
                    self.dropped
                )));
            }
        }
        let event = LintEvent::Finished {
            outcome: Arc::new(outcome),
            dropped: self.dropped,
        };
        self.push(event);
    }
}

#[derive(Debug)]
enum EventKind {
    State,
    Set,
    DirectoryGroup,
    Finished,
}

impl EventKind {
    fn of(event: &LintEvent) -> Self {
        match event {
            LintEvent::State { .. } => Self::State,
            LintEvent::Set(_) => Self::Set,
            LintEvent::DirectoryGroup(_) => Self::DirectoryGroup,
            LintEvent::Finished { .. } => Self::Finished,
        }
    }
}

/// Consumer side of the queue.
#[derive(Debug, Clone)]
pub struct EventReceiver {
    rx: Receiver<LintEvent>,
}

impl EventReceiver {
    /// Block until the next event. `None` once the engine side is gone.
    pub fn recv(&self) -> Option<LintEvent> {
        self.rx.recv().ok()
    }

    /// Wait at most `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<LintEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Next event if one is queued.
    pub fn try_recv(&self) -> Option<LintEvent> {
        self.rx.try_recv().ok()
    }

    /// Events queued right now.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Iterate until the terminal event (inclusive) or disconnection.
    pub fn iter(&self) -> impl Iterator<Item = LintEvent> + '_ {
        let mut done = false;
        std::iter::from_fn(move || {
            if done {
                return None;
            }
            let event = self.recv()?;
            done = event.is_finished();
            Some(event)
        })
    }

    /// Replay queued events into `subscriber` on the calling thread.
    ///
    /// Returns the terminal outcome, or `None` if the engine side went
    /// away without finishing.
    pub fn forward_to<S>(&self, subscriber: &mut S) -> Option<Arc<RunOutcome>>
    where
        S: LintSubscriber + ?Sized,
    {
        for event in self.iter() {
            match event {
                LintEvent::State { from, to } => subscriber.on_state_changed(from, to),
                LintEvent::Set(elements) => subscriber.on_set_resolved(&elements),
                LintEvent::DirectoryGroup(group) => subscriber.on_directory_group(&group),
                LintEvent::Finished { outcome, .. } => {
                    subscriber.on_finished(&outcome);
                    return Some(outcome);
                }
            }
        }
        None
    }
}
