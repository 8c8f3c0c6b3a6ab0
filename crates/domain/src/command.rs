//! Command handling infrastructure.

use std::marker::PhantomData;

use common::{AggregateId, UserId};
use store::{Document, DocumentStore, SaveOptions, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and applied.
    pub events: Vec<A::Event>,

    /// The version of the aggregate after the command.
    pub new_version: Version,
}

/// Trait for commands that can be executed against an aggregate.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Handler for executing commands against aggregates.
///
/// The handler:
/// 1. Loads the aggregate document from the store
/// 2. Runs the command to produce events
/// 3. Applies the events and saves the whole aggregate at the next version,
///    expecting the version it was loaded at
///
/// A lost race surfaces as [`DomainError::ConcurrentModification`]. Retrying is
/// the caller's decision.
pub struct CommandHandler<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate.
    ///
    /// If the aggregate doesn't exist, returns a default instance at version 0.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        match self.store.load(A::aggregate_type(), aggregate_id).await? {
            Some(document) => decode(&document),
            None => Ok(A::default()),
        }
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Loads every aggregate of this type owned by a user, newest first.
    pub async fn list_by_owner(&self, owner: UserId) -> Result<Vec<A>, DomainError> {
        self.store
            .list_by_owner(A::aggregate_type(), owner)
            .await?
            .iter()
            .map(decode::<A>)
            .collect()
    }

    /// Loads every aggregate of this type, newest first.
    pub async fn list(&self) -> Result<Vec<A>, DomainError> {
        self.store
            .list(A::aggregate_type())
            .await?
            .iter()
            .map(decode::<A>)
            .collect()
    }

    /// Loads an aggregate, runs a command against it and saves the result.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        self.execute_on(aggregate_id, aggregate, command_fn).await
    }

    /// Runs a command against an aggregate the caller already loaded.
    ///
    /// The save expects the version the aggregate carries, so any write that
    /// happened since the caller's load makes this fail with
    /// `ConcurrentModification`.
    pub async fn execute_on<F>(
        &self,
        aggregate_id: AggregateId,
        mut aggregate: A,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        for event in &events {
            tracing::debug!(
                aggregate_type = A::aggregate_type(),
                %aggregate_id,
                event_type = event.event_type(),
                "applying event"
            );
            aggregate.apply(event.clone());
        }

        let new_version = current_version.next();
        let document = Document::from_state(
            aggregate_id,
            A::aggregate_type(),
            aggregate.owner(),
            new_version,
            &aggregate,
        )?;

        let options = if current_version == Version::initial() {
            SaveOptions::expect_new()
        } else {
            SaveOptions::expect_version(current_version)
        };

        let new_version = self.store.save(document, options).await?;
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }
}

fn decode<A: Aggregate>(document: &Document) -> Result<A, DomainError> {
    let mut aggregate: A = document.decode()?;
    aggregate.set_version(document.version);
    Ok(aggregate)
}
