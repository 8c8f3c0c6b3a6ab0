//! Core aggregate and domain event traits.

use common::{AggregateId, UserId};
use serde::{Serialize, de::DeserializeOwned};
use store::Version;

/// Trait for domain events.
///
/// Events are the facts a command produced. They are applied to the aggregate
/// before it is written back as a whole document.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name, used in logs.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates persisted as versioned documents.
///
/// Commands inspect the current state and return events; `apply` folds those
/// events into the state. The command handler then saves the whole aggregate
/// with an optimistic check against the version it was loaded at.
pub trait Aggregate: Default + Serialize + DeserializeOwned + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's commands can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name, used as the document kind.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier, `None` for an aggregate never saved.
    fn id(&self) -> Option<AggregateId>;

    /// Returns the user this aggregate belongs to.
    fn owner(&self) -> Option<UserId>;

    /// Returns the version the aggregate was loaded or last saved at.
    ///
    /// Version 0 means the aggregate does not exist in the store yet.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    ///
    /// Must be deterministic and must not fail: the command already validated
    /// the change.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened { id: AggregateId, owner: UserId },
        Bumped { by: i32 },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "CounterOpened",
                CounterEvent::Bumped { .. } => "CounterBumped",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Counter {
        id: Option<AggregateId>,
        owner: Option<UserId>,
        value: i32,
        #[serde(skip)]
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter error")]
    struct CounterError;

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn owner(&self) -> Option<UserId> {
            self.owner
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened { id, owner } => {
                    self.id = Some(id);
                    self.owner = Some(owner);
                }
                CounterEvent::Bumped { by } => self.value += by,
            }
        }
    }

    #[test]
    fn apply_events_folds_in_order() {
        let id = AggregateId::new();
        let owner = UserId::new();
        let mut counter = Counter::default();

        counter.apply_events(vec![
            CounterEvent::Opened { id, owner },
            CounterEvent::Bumped { by: 2 },
            CounterEvent::Bumped { by: 40 },
        ]);

        assert_eq!(counter.id(), Some(id));
        assert_eq!(counter.owner(), Some(owner));
        assert_eq!(counter.value, 42);
        assert_eq!(counter.version(), Version::initial());
    }

    #[test]
    fn event_type_names() {
        let event = CounterEvent::Bumped { by: 1 };
        assert_eq!(event.event_type(), "CounterBumped");
    }
}
