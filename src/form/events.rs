use std::cell::{Cell, RefCell};
use std::fmt::{Display, Formatter};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Broadcast channel with no replay: subscribers only see events emitted after they subscribed.
pub struct EventStream<T> {
    subscribers: RefCell<Vec<UnboundedSender<T>>>,
    closed: Cell<bool>,
}

impl<T> Default for EventStream<T> {
    fn default() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            closed: Cell::new(false),
        }
    }
}

impl<T: Clone> EventStream<T> {
    /// Returns a stream of future events. After `close` the stream ends immediately.
    pub fn subscribe(&self) -> UnboundedReceiver<T> {
        let (sender, receiver) = mpsc::unbounded();
        if !self.closed.get() {
            self.subscribers.borrow_mut().push(sender);
        }
        receiver
    }

    pub(crate) fn emit(&self, event: T) {
        if self.closed.get() {
            return;
        }
        self.subscribers
            .borrow_mut()
            .retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
    }

    pub(crate) fn close(&self) {
        self.closed.set(true);
        for subscriber in self.subscribers.borrow_mut().drain(..) {
            subscriber.close_channel();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

/// Identity of a child within its container.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChildKey {
    Name(String),
    Index(usize),
}

impl Display for ChildKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildKey::Name(name) => f.write_str(name),
            ChildKey::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Structural change of a container's child set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CollectionChange {
    Added(Vec<ChildKey>),
    Removed(Vec<ChildKey>),
}
