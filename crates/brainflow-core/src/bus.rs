//! Hierarchical, synchronous event bus.
//!
//! Every feature owns an [`EventNode`]. Handlers are registered per
//! [`EventCategory`] and run inline on the thread that calls `raise`, in
//! registration order. After the local handlers, the event may be offered to
//! the parent node according to the node's [`Propagation`] policy:
//!
//! ```text
//! root (navigation, alert routing)
//!  └── timer (lifecycle recovery, UI observers)
//! ```
//!
//! A child only holds a `Weak` reference to its parent, so the tree is owned
//! top-down and a dropped parent simply ends propagation. Dropping a node
//! releases all of its subscriptions; no handler of a dropped node fires
//! afterwards.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::events::{DomainEvent, EventCategory, LifecycleEvent, TimerEvent};

type Handler = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

/// Returned by `subscribe`; pass to `unsubscribe` to release the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// When an event raised on a node is also offered to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Only when no local handler is registered for the event's category.
    #[default]
    Unclaimed,
    /// After the local handlers, regardless of whether any ran.
    Always,
}

struct Subscription {
    id: SubscriptionId,
    category: EventCategory,
    handler: Handler,
    active: Arc<AtomicBool>,
}

struct NodeInner {
    name: String,
    parent: Weak<NodeInner>,
    propagation: Propagation,
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl NodeInner {
    fn subscriptions(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(self: &Arc<Self>, event: &DomainEvent) {
        let category = event.category();
        // Snapshot under the lock, call outside it: handlers may raise or
        // (un)subscribe on this same node.
        let matching: Vec<(Handler, Arc<AtomicBool>)> = self
            .subscriptions()
            .iter()
            .filter(|s| s.category == category)
            .map(|s| (Arc::clone(&s.handler), Arc::clone(&s.active)))
            .collect();

        let claimed = !matching.is_empty();
        for (handler, active) in matching {
            if active.load(Ordering::Acquire) {
                handler(event);
            }
        }

        if !claimed || self.propagation == Propagation::Always {
            if let Some(parent) = self.parent.upgrade() {
                tracing::trace!(from = %self.name, to = %parent.name, ?event, "propagating event");
                parent.dispatch(event);
            }
        }
    }

    fn release_all(&self) {
        let mut subs = self.subscriptions();
        for sub in subs.iter() {
            sub.active.store(false, Ordering::Release);
        }
        subs.clear();
    }
}

/// An owned node in the event tree.
pub struct EventNode {
    inner: Arc<NodeInner>,
}

impl EventNode {
    /// Create a root node.
    pub fn root(name: impl Into<String>) -> Self {
        Self::build(name.into(), Weak::new(), Propagation::default())
    }

    /// Create a child whose unclaimed events are offered to `self`.
    pub fn child(&self, name: impl Into<String>) -> Self {
        self.child_with(name, Propagation::default())
    }

    pub fn child_with(&self, name: impl Into<String>, propagation: Propagation) -> Self {
        Self::build(name.into(), Arc::downgrade(&self.inner), propagation)
    }

    fn build(name: String, parent: Weak<NodeInner>, propagation: Propagation) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                name,
                parent,
                propagation,
                next_id: AtomicU64::new(1),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Non-owning handle for raising events from inside handlers or tasks.
    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscribe<F>(&self, category: EventCategory, handler: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscriptions().push(Subscription {
            id,
            category,
            handler: Arc::new(handler),
            active: Arc::new(AtomicBool::new(true)),
        });
        id
    }

    /// Typed subscription for lifecycle signals.
    pub fn on_lifecycle<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(LifecycleEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventCategory::Lifecycle, move |event| {
            if let DomainEvent::Lifecycle(e) = event {
                handler(*e);
            }
        })
    }

    /// Typed subscription for timer-domain signals.
    pub fn on_timer<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(TimerEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventCategory::Timer, move |event| {
            if let DomainEvent::Timer(e) = event {
                handler(*e);
            }
        })
    }

    /// Returns `false` when the id was not registered on this node.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.inner.subscriptions();
        match subs.iter().position(|s| s.id == id) {
            Some(pos) => {
                let sub = subs.remove(pos);
                sub.active.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions().len()
    }

    pub fn raise(&self, event: impl Into<DomainEvent>) {
        self.inner.dispatch(&event.into());
    }
}

impl Drop for EventNode {
    fn drop(&mut self) {
        self.inner.release_all();
    }
}

impl fmt::Debug for EventNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNode")
            .field("name", &self.inner.name)
            .field("propagation", &self.inner.propagation)
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

/// Weak reference to an [`EventNode`].
#[derive(Clone)]
pub struct NodeHandle {
    inner: Weak<NodeInner>,
}

impl NodeHandle {
    /// Raise on the node if it is still alive. Returns whether it was.
    pub fn raise(&self, event: impl Into<DomainEvent>) -> bool {
        match self.inner.upgrade() {
            Some(node) => {
                node.dispatch(&event.into());
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
