//! Incremental result delivery.
//!
//! # Overview
//!
//! The engine pushes results to any number of [`LintSubscriber`]s through
//! an [`Emitter`]. A duplicate set is delivered only once it is fully
//! resolved, and all of its [`LintElement`]s are delivered together, so a
//! subscriber never sees an element whose sibling list could still change.
//! Delivery is serialized: elements of two sets are never interleaved.
//!
//! Subscribers that must not slow the engine down should be wrapped in a
//! bounded queue, see [`channel`].
//!
//! # Example
//!
//! ```
//! use dupelint::emitter::{Emitter, LintElement, LintSubscriber, RunOutcome};
//!
//! struct Count(usize);
//!
//! impl LintSubscriber for Count {
//!     fn on_element_added(&mut self, _element: &LintElement) {
//!         self.0 += 1;
//!     }
//!     fn on_finished(&mut self, _outcome: &RunOutcome) {}
//! }
//!
//! let emitter = Emitter::new().with_subscriber(Count(0));
//! assert_eq!(emitter.subscriber_count(), 1);
//! ```

pub mod channel;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duplicates::{DirectoryGroup, DuplicateSet, FinderError, RunState, RunSummary};
use crate::scanner::Digest;

pub use channel::{channel, ChannelSubscriber, EventReceiver, LintEvent, OverflowPolicy};

/// Terminal result of a run, delivered to every subscriber.
pub type RunOutcome = Result<RunSummary, FinderError>;

/// One member of a resolved duplicate set.
///
/// Holds a shared reference to the set rather than a copy of it, so the
/// sibling list is the same object for every element of the set.
#[derive(Debug, Clone)]
pub struct LintElement {
    set: Arc<DuplicateSet>,
    index: usize,
}

impl LintElement {
    /// Element for member `index` of `set`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range for the set.
    #[must_use]
    pub fn new(set: Arc<DuplicateSet>, index: usize) -> Self {
        assert!(index < set.members.len(), "member index out of range");
        Self { set, index }
    }

    /// Every element of a set, original first.
    #[must_use]
    pub fn all_of(set: &Arc<DuplicateSet>) -> Vec<Self> {
        (0..set.members.len())
            .map(|index| Self {
                set: Arc::clone(set),
                index,
            })
            .collect()
    }

    /// Path of this member.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.set.members[self.index].path
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.set.size
    }

    /// Modification time.
    #[must_use]
    pub fn modified(&self) -> SystemTime {
        self.set.members[self.index].modified
    }

    /// Whether this member is the original of its set.
    #[must_use]
    pub fn is_original(&self) -> bool {
        self.index == 0
    }

    /// Number of siblings (set size minus one).
    #[must_use]
    pub fn twin_count(&self) -> usize {
        self.set.twin_count()
    }

    /// Paths of every other member of the set, original first.
    #[must_use]
    pub fn sibling_paths(&self) -> Vec<PathBuf> {
        self.set
            .members
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.index)
            .map(|(_, m)| m.path.clone())
            .collect()
    }

    /// Digest shared by the set.
    #[must_use]
    pub fn digest(&self) -> &Digest {
        &self.set.digest
    }

    /// Identifier of the set.
    #[must_use]
    pub fn set_id(&self) -> usize {
        self.set.id
    }

    /// Position within the set (0 is the original).
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The set this element belongs to.
    #[must_use]
    pub fn set(&self) -> &Arc<DuplicateSet> {
        &self.set
    }

    /// Flat, serializable form.
    #[must_use]
    pub fn to_record(&self) -> LintRecord {
        LintRecord {
            set_id: self.set_id(),
            path: self.path().to_path_buf(),
            size: self.size(),
            mtime: DateTime::<Utc>::from(self.modified()),
            is_original: self.is_original(),
            twin_count: self.twin_count(),
            sibling_paths: self.sibling_paths(),
            checksum: self.digest().to_hex(),
            algorithm: self.digest().algorithm().name().to_string(),
        }
    }
}

/// Serializable view of a [`LintElement`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintRecord {
    /// Identifier of the duplicate set
    pub set_id: usize,
    /// File path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Modification time
    pub mtime: DateTime<Utc>,
    /// Whether this file is the set's original
    pub is_original: bool,
    /// Number of siblings
    pub twin_count: usize,
    /// Paths of the siblings, original first
    pub sibling_paths: Vec<PathBuf>,
    /// Lowercase hex digest
    pub checksum: String,
    /// Algorithm that produced the digest
    pub algorithm: String,
}

/// Receiver of engine events.
///
/// Calls are serialized by the [`Emitter`]; implementations do not need
/// their own locking.
pub trait LintSubscriber: Send {
    /// The run moved from `from` to `to`.
    fn on_state_changed(&mut self, _from: RunState, _to: RunState) {}

    /// One element of a resolved set.
    fn on_element_added(&mut self, element: &LintElement);

    /// A whole set was resolved. The default forwards each element, in
    /// order, to [`LintSubscriber::on_element_added`].
    fn on_set_resolved(&mut self, elements: &[LintElement]) {
        for element in elements {
            self.on_element_added(element);
        }
    }

    /// Directories with identical duplicate content were found.
    fn on_directory_group(&mut self, _group: &DirectoryGroup) {}

    /// The run ended. Called exactly once, last.
    fn on_finished(&mut self, outcome: &RunOutcome);
}

/// Fan-out of engine events to registered subscribers.
#[derive(Default)]
pub struct Emitter {
    subscribers: Mutex<Vec<Box<dyn LintSubscriber>>>,
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Emitter {
    /// Create an emitter with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber (builder form).
    #[must_use]
    pub fn with_subscriber(self, subscriber: impl LintSubscriber + 'static) -> Self {
        self.subscribe(Box::new(subscriber));
        self
    }

    /// Add a subscriber.
    pub fn subscribe(&self, subscriber: Box<dyn LintSubscriber>) {
        self.lock().push(subscriber);
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn LintSubscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Announce a state transition.
    pub fn state_changed(&self, from: RunState, to: RunState) {
        for subscriber in self.lock().iter_mut() {
            subscriber.on_state_changed(from, to);
        }
    }

    /// Deliver a resolved set. Every element is built before the first
    /// subscriber is called.
    ///
    /// Returns the number of elements delivered.
    pub fn emit_set(&self, set: &Arc<DuplicateSet>) -> usize {
        let elements = LintElement::all_of(set);
        let mut subscribers = self.lock();
        for subscriber in subscribers.iter_mut() {
            subscriber.on_set_resolved(&elements);
        }
        elements.len()
    }

    /// Deliver a group of equal directories.
    pub fn emit_directory_group(&self, group: &DirectoryGroup) {
        for subscriber in self.lock().iter_mut() {
            subscriber.on_directory_group(group);
        }
    }

    /// Deliver the terminal event.
    pub fn finish(&self, outcome: &RunOutcome) {
        for subscriber in self.lock().iter_mut() {
            subscriber.on_finished(outcome);
        }
    }
}
