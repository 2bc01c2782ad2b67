use std::time::Instant;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::errors::{MoiraError, Result};
use crate::fate::id::FateId;
use crate::fate::repo::Repo;
use crate::moira::Moira;
use crate::mutation::condition::MutationStatus;
use crate::tablets::catalog::{LockType, TableState};
use crate::tablets::extent::{NamespaceId, TableId};
use crate::tablets::metadata::TabletAvailability;
use crate::tablets::range::{Key, RowRange};

/// The step of a table operation that sets the availability of every tablet
/// of a table overlapping a range.
///
/// The work happens in [`Repo::is_ready`]: each pass submits the change for
/// every tablet that does not have the target availability yet and reports a
/// non-zero wait hint while any tablet could not be changed, typically
/// because another operation holds it. Once a pass finds nothing left to do,
/// [`Repo::call`] releases the table and namespace locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTabletAvailability {
    table_id: TableId,
    namespace_id: NamespaceId,
    range: RowRange,
    availability: TabletAvailability,
}

impl SetTabletAvailability {
    pub fn new(
        table_id: TableId,
        namespace_id: NamespaceId,
        range: RowRange,
        availability: TabletAvailability,
    ) -> Self {
        Self {
            table_id,
            namespace_id,
            range,
            availability,
        }
    }

    pub fn table_id(&self) -> &TableId {
        &self.table_id
    }

    pub fn range(&self) -> &RowRange {
        &self.range
    }

    pub fn availability(&self) -> TabletAvailability {
        self.availability
    }
}

impl Repo<Moira> for SetTabletAvailability {
    fn name(&self) -> String {
        "SetTabletAvailability".to_string()
    }

    fn is_ready(&self, fate_id: &FateId, env: &Moira) -> Result<u64> {
        let state = env.catalog().table_state(&self.table_id);
        if state != TableState::Online {
            return Err(MoiraError::TableOffline {
                table_id: self.table_id.to_string(),
                description: format!("table is {state:?}, cannot set tablet availability"),
            });
        }

        debug!(
            "{} setting tablet availability to {} for table {} range {}",
            fate_id, self.availability, self.table_id, self.range
        );

        let scan_start = self.range.start_key().map(|key| key.row.as_str());
        let target = self.availability;
        let start = Instant::now();
        let mut not_accepted = 0usize;

        {
            let tablets = env.read_tablets().overlapping(&self.table_id, scan_start)?;
            let mut mutator = env.conditionally_mutate_tablets(|result| {
                if result.status() != MutationStatus::Accepted {
                    not_accepted += 1;
                    let blocker = result
                        .read_metadata()
                        .ok()
                        .flatten()
                        .and_then(|tm| tm.operation_id().map(ToString::to_string));
                    debug!(
                        "{} could not set availability of {}, operation {:?}",
                        fate_id,
                        result.extent(),
                        blocker
                    );
                }
            });

            for tm in tablets {
                let tm = tm?;

                if let (Some(scan_start), Some(end_row)) = (scan_start, tm.end_row()) {
                    if end_row < scan_start {
                        return Err(MoiraError::IllegalState(format!(
                            "bug: tablet {} ends before scan start {}",
                            tm.extent(),
                            scan_start
                        )));
                    }
                }

                if let Some(prev) = tm.prev_end_row() {
                    if self.range.after_end_key(&Key::row(prev).following_row()) {
                        trace!("{} past end of range at {}", fate_id, tm.extent());
                        break;
                    }
                }

                if tm.tablet_availability() == Some(target) {
                    trace!("{} {} already {}", fate_id, tm.extent(), target);
                    continue;
                }

                let extent = tm.extent().clone();
                mutator
                    .mutate_tablet(extent)
                    .require_absent_operation()
                    .put_tablet_availability(target)
                    .submit(
                        move |tm| tm.tablet_availability() == Some(target),
                        || format!("set availability {target}"),
                    )?;
            }

            mutator.close()?;
        }

        if not_accepted > 0 {
            let hint = env.config().wait_hint(start.elapsed());
            debug!("{} {} tablets not updated, waiting {}ms", fate_id, not_accepted, hint);
            Ok(hint)
        } else {
            Ok(0)
        }
    }

    fn call(&self, fate_id: &FateId, env: &Moira) -> Result<Option<Box<dyn Repo<Moira>>>> {
        env.catalog()
            .unreserve_namespace(&self.namespace_id, fate_id, LockType::Read);
        env.catalog()
            .unreserve_table(&self.table_id, fate_id, LockType::Write);
        Ok(None)
    }
}
