//! Typed event system with pre-allocated ring buffers.
//!
//! Events are emitted while a tick or a command mutates the state and are
//! delivered in batch once that mutation is complete. Each event kind has its
//! own [`EventBuffer`] ring buffer with a configurable capacity.
//!
//! Listeners are passive: they observe events and cannot mutate the
//! simulation. Collaborators that want to react issue a new command.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which prevents
//! any allocation or recording for that kind.

use crate::agent::ShippingKind;
use crate::business::{BusinessKind, UpgradeKind};
use crate::command::Rejection;
use crate::fixed::Millis;
use crate::id::{AgentId, BusinessId, DeliveryId};
use crate::resource::Resource;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the simulation time they occurred at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Commands --
    BusinessPlaced {
        business: BusinessId,
        kind: BusinessKind,
        cost: i64,
        at_ms: Millis,
    },
    BusinessUpgraded {
        business: BusinessId,
        upgrade: UpgradeKind,
        cost: i64,
        level: u32,
        at_ms: Millis,
    },
    BusinessRelocated {
        business: BusinessId,
        cost: i64,
        at_ms: Millis,
    },
    AgentHired {
        business: BusinessId,
        agent: AgentId,
        kind: ShippingKind,
        cost: i64,
        at_ms: Millis,
    },
    AgentSold {
        business: BusinessId,
        agent: AgentId,
        kind: ShippingKind,
        refund: i64,
        /// The agent was mid-delivery when sold.
        forced: bool,
        at_ms: Millis,
    },
    CommandRejected {
        reason: Rejection,
        at_ms: Millis,
    },
    AchievementUnlocked {
        name: String,
        at_ms: Millis,
    },

    // -- Production --
    BatchProduced {
        business: BusinessId,
        resource: Resource,
        quantity: u32,
        at_ms: Millis,
    },

    // -- Deliveries --
    DeliveryDispatched {
        delivery: DeliveryId,
        source: BusinessId,
        target: BusinessId,
        agent: AgentId,
        resource: Resource,
        amount: u32,
        arrival_ms: Millis,
        at_ms: Millis,
    },
    DeliverySettled {
        delivery: DeliveryId,
        source: BusinessId,
        target: BusinessId,
        resource: Resource,
        amount: u32,
        revenue: i64,
        at_ms: Millis,
    },
    DeliveryDropped {
        delivery: DeliveryId,
        source: BusinessId,
        target: BusinessId,
        resource: Resource,
        amount: u32,
        at_ms: Millis,
    },
    DeliveryCancelled {
        delivery: DeliveryId,
        source: BusinessId,
        target: BusinessId,
        agent: AgentId,
        /// Cargo put back into the source's outgoing storage.
        returned: u32,
        /// Cargo that no longer fit and was discarded.
        lost: u32,
        at_ms: Millis,
    },

    // -- Market --
    MarketRetargeted {
        at_ms: Millis,
    },
}

/// Discriminant tag for event kinds, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BusinessPlaced,
    BusinessUpgraded,
    BusinessRelocated,
    AgentHired,
    AgentSold,
    CommandRejected,
    AchievementUnlocked,
    BatchProduced,
    DeliveryDispatched,
    DeliverySettled,
    DeliveryDropped,
    DeliveryCancelled,
    MarketRetargeted,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 13;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::BusinessPlaced { .. } => EventKind::BusinessPlaced,
            Event::BusinessUpgraded { .. } => EventKind::BusinessUpgraded,
            Event::BusinessRelocated { .. } => EventKind::BusinessRelocated,
            Event::AgentHired { .. } => EventKind::AgentHired,
            Event::AgentSold { .. } => EventKind::AgentSold,
            Event::CommandRejected { .. } => EventKind::CommandRejected,
            Event::AchievementUnlocked { .. } => EventKind::AchievementUnlocked,
            Event::BatchProduced { .. } => EventKind::BatchProduced,
            Event::DeliveryDispatched { .. } => EventKind::DeliveryDispatched,
            Event::DeliverySettled { .. } => EventKind::DeliverySettled,
            Event::DeliveryDropped { .. } => EventKind::DeliveryDropped,
            Event::DeliveryCancelled { .. } => EventKind::DeliveryCancelled,
            Event::MarketRetargeted { .. } => EventKind::MarketRetargeted,
        }
    }

    /// Simulation time the event was recorded at.
    pub fn at_ms(&self) -> Millis {
        match self {
            Event::BusinessPlaced { at_ms, .. }
            | Event::BusinessUpgraded { at_ms, .. }
            | Event::BusinessRelocated { at_ms, .. }
            | Event::AgentHired { at_ms, .. }
            | Event::AgentSold { at_ms, .. }
            | Event::CommandRejected { at_ms, .. }
            | Event::AchievementUnlocked { at_ms, .. }
            | Event::BatchProduced { at_ms, .. }
            | Event::DeliveryDispatched { at_ms, .. }
            | Event::DeliverySettled { at_ms, .. }
            | Event::DeliveryDropped { at_ms, .. }
            | Event::DeliveryCancelled { at_ms, .. }
            | Event::MarketRetargeted { at_ms } => *at_ms,
        }
    }
}

impl EventKind {
    /// Every kind, in discriminant order.
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::BusinessPlaced,
        EventKind::BusinessUpgraded,
        EventKind::BusinessRelocated,
        EventKind::AgentHired,
        EventKind::AgentSold,
        EventKind::CommandRejected,
        EventKind::AchievementUnlocked,
        EventKind::BatchProduced,
        EventKind::DeliveryDispatched,
        EventKind::DeliverySettled,
        EventKind::DeliveryDropped,
        EventKind::DeliveryCancelled,
        EventKind::MarketRetargeted,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push an event. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Iterate over events from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        // Once full, head points at the oldest entry.
        let start = if self.len < self.capacity() { 0 } else { self.head };
        (0..self.len).filter_map(move |i| self.events[(start + i) % self.capacity()].as_ref())
    }

    /// Clear stored events. `total_written` is a lifetime counter and is kept.
    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Optional predicate that filters events for a listener.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// Priority level for listeners. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct ListenerEntry {
    listener: PassiveListener,
    priority: ListenerPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Holds one ring buffer per event kind, listener lists, and suppression
/// flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<ListenerEntry>; EVENT_KIND_COUNT],
    default_capacity: usize,
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create an event bus with the given buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            default_capacity,
            next_insertion_order: 0,
        }
    }

    /// Suppress an event kind. Suppressed events are never buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Record an event. No-op if its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Register a listener with normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, ListenerPriority::Normal, None, listener);
    }

    /// Register a listener with explicit priority and optional filter.
    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: ListenerPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        let entries = &mut self.listeners[kind.index()];
        entries.push(ListenerEntry {
            listener,
            priority,
            filter,
            insertion_order: order,
        });
        entries.sort_by_key(|e| (e.priority, e.insertion_order));
    }

    /// Deliver all buffered events to listeners, then clear the buffers.
    ///
    /// Kinds are visited in discriminant order; within a kind, events go
    /// oldest-to-newest and listeners in `(priority, insertion_order)`.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }

            let events: Vec<Event> = buffer.iter().cloned().collect();
            buffer.clear();

            for entry in &mut self.listeners[idx] {
                for event in &events {
                    if let Some(ref filter) = entry.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    (entry.listener)(event);
                }
            }
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    /// Events currently buffered (not yet delivered) for a kind.
    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()].as_ref().map_or(0, |b| b.len())
    }

    /// Events ever emitted for a kind, including delivered and dropped ones.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, |b| b.total_written())
    }

    /// Clear all buffers. Listeners and suppression settings are kept.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
