use std::sync::Arc;

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use log::{debug, trace, warn};

use crate::errors::{MoiraError, Result};
use crate::mutation::condition::{Condition, ConditionalMutation, MutationStatus};
use crate::storage::RecordStore;
use crate::tablets::extent::KeyExtent;
use crate::tablets::metadata::{
    TabletAvailability, TabletMetadata, TabletOperationId, TabletsReader, availability_column,
    encode_prev_row, operation_id_column, prev_row_column,
};

type Validator = Box<dyn Fn(&TabletMetadata) -> bool + Send>;
type Outcome = (KeyExtent, Result<MutationStatus>);

/// The final outcome of one tablet mutation, handed to the results consumer.
pub struct ConditionalTabletResult {
    extent: KeyExtent,
    status: MutationStatus,
    store: Arc<dyn RecordStore>,
}

impl ConditionalTabletResult {
    pub fn extent(&self) -> &KeyExtent {
        &self.extent
    }

    /// `Accepted` or `Rejected`. `Unknown` outcomes are resolved with the
    /// submission's validator before they reach the consumer.
    pub fn status(&self) -> MutationStatus {
        self.status
    }

    /// Reads the tablet's metadata as it is now, e.g. to find out which
    /// operation blocked a rejected mutation.
    pub fn read_metadata(&self) -> Result<Option<TabletMetadata>> {
        TabletsReader::new(&*self.store).read_tablet(&self.extent)
    }
}

struct Pending {
    validator: Validator,
    description: String,
}

/// Submits conditional mutations for many tablets without waiting on any
/// one of them.
///
/// Every submission is handed to the store right away; outcomes are collected
/// as they complete and passed to `results_consumer`. [`close`] waits for
/// whatever is still in flight. A rejection of one tablet never affects the
/// others.
///
/// [`close`]: AsyncConditionalTabletsMutator::close
pub struct AsyncConditionalTabletsMutator<F>
where
    F: FnMut(ConditionalTabletResult),
{
    store: Arc<dyn RecordStore>,
    in_flight: FuturesUnordered<BoxFuture<'static, Outcome>>,
    pending: HashMap<KeyExtent, Pending>,
    submitted: HashSet<KeyExtent>,
    results_consumer: F,
    closed: bool,
}

impl<F> AsyncConditionalTabletsMutator<F>
where
    F: FnMut(ConditionalTabletResult),
{
    pub fn new(store: Arc<dyn RecordStore>, results_consumer: F) -> Self {
        Self {
            store,
            in_flight: FuturesUnordered::new(),
            pending: HashMap::new(),
            submitted: HashSet::new(),
            results_consumer,
            closed: false,
        }
    }

    /// Starts a mutation of the tablet with `extent`. The mutation always
    /// requires that the tablet still has the same prev end row, so it cannot
    /// land on a tablet that was split or merged since it was read.
    pub fn mutate_tablet(&mut self, extent: KeyExtent) -> ConditionalTabletMutator<'_, F> {
        let mut mutation = ConditionalMutation::new(extent.metadata_row());
        mutation.require(Condition::equals(
            prev_row_column(),
            encode_prev_row(extent.prev_end_row()),
        ));
        ConditionalTabletMutator {
            parent: self,
            extent,
            mutation,
        }
    }

    fn submit(&mut self, extent: KeyExtent, mutation: ConditionalMutation, pending: Pending) -> Result<()> {
        if !mutation.has_writes() {
            return Err(MoiraError::IllegalState(format!("mutation for {extent} has no writes")));
        }
        if !self.submitted.insert(extent.clone()) {
            return Err(MoiraError::IllegalState(format!(
                "attempted to add second mutation for {extent}"
            )));
        }
        trace!("submitting {} for {}", pending.description, extent);
        self.pending.insert(extent.clone(), pending);
        let outcome = self.store.submit_async(mutation).map(move |r| (extent, r));
        self.in_flight.push(outcome.boxed());
        self.process_ready()
    }

    /// Hands every outcome that is already available to the consumer,
    /// without blocking.
    pub fn process_ready(&mut self) -> Result<()> {
        while let Some(Some(outcome)) = self.in_flight.next().now_or_never() {
            self.process(outcome)?;
        }
        Ok(())
    }

    fn process(&mut self, (extent, result): Outcome) -> Result<()> {
        let pending = self.pending.remove(&extent).ok_or_else(|| {
            MoiraError::IllegalState(format!("no pending mutation for {extent}"))
        })?;
        let status = match result {
            Ok(status) => status,
            Err(e) => {
                warn!("{} for {} failed: {}", pending.description, extent, e);
                MutationStatus::Unknown
            }
        };
        let status = match status {
            MutationStatus::Unknown => {
                let current = TabletsReader::new(&*self.store).read_tablet(&extent)?;
                let resolved = match current {
                    Some(tm) if (pending.validator)(&tm) => MutationStatus::Accepted,
                    _ => MutationStatus::Rejected,
                };
                debug!(
                    "{} for {} had an unknown outcome, resolved to {}",
                    pending.description, extent, resolved
                );
                resolved
            }
            status => status,
        };
        if status != MutationStatus::Accepted {
            debug!("{} for {} was {}", pending.description, extent, status);
        }
        (self.results_consumer)(ConditionalTabletResult {
            extent,
            status,
            store: Arc::clone(&self.store),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        while let Some(outcome) = futures::executor::block_on(self.in_flight.next()) {
            self.process(outcome)?;
        }
        Ok(())
    }

    /// Waits for every submitted mutation and reports its outcome.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.flush()
    }
}

impl<F> Drop for AsyncConditionalTabletsMutator<F>
where
    F: FnMut(ConditionalTabletResult),
{
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.flush() {
                warn!("failed to flush tablet mutations on drop: {}", e);
            }
        }
    }
}

/// Builds the mutation of a single tablet.
pub struct ConditionalTabletMutator<'m, F>
where
    F: FnMut(ConditionalTabletResult),
{
    parent: &'m mut AsyncConditionalTabletsMutator<F>,
    extent: KeyExtent,
    mutation: ConditionalMutation,
}

impl<F> ConditionalTabletMutator<'_, F>
where
    F: FnMut(ConditionalTabletResult),
{
    /// Requires that no operation currently claims the tablet.
    pub fn require_absent_operation(mut self) -> Self {
        self.mutation.require(Condition::Absent(operation_id_column()));
        self
    }

    pub fn require_operation(mut self, operation_id: &TabletOperationId) -> Self {
        self.mutation.require(Condition::equals(
            operation_id_column(),
            operation_id.to_string().into_bytes(),
        ));
        self
    }

    pub fn put_tablet_availability(mut self, availability: TabletAvailability) -> Self {
        self.mutation
            .put(availability_column(), availability.as_str().as_bytes().to_vec());
        self
    }

    pub fn put_operation(mut self, operation_id: &TabletOperationId) -> Self {
        self.mutation
            .put(operation_id_column(), operation_id.to_string().into_bytes());
        self
    }

    pub fn delete_operation(mut self) -> Self {
        self.mutation.delete(operation_id_column());
        self
    }

    /// Sends the mutation.
    ///
    /// `validator` says whether a tablet's metadata shows this mutation as
    /// applied; it is only consulted when the store cannot report an outcome.
    pub fn submit<V, D>(self, validator: V, description: D) -> Result<()>
    where
        V: Fn(&TabletMetadata) -> bool + Send + 'static,
        D: FnOnce() -> String,
    {
        let pending = Pending {
            validator: Box::new(validator),
            description: description(),
        };
        self.parent.submit(self.extent, self.mutation, pending)
    }
}
