use crate::errors::Result;
use crate::fate::id::FateId;

/// One step of a FATE procedure, run against an environment `E`.
///
/// The executor first polls [`Repo::is_ready`] until it returns `0`, then runs
/// [`Repo::call`], which hands back the next step to push, if any.
pub trait Repo<E>: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> String;

    /// Returns `0` when the step can run, or a suggested delay in
    /// milliseconds before asking again.
    fn is_ready(&self, fate_id: &FateId, env: &E) -> Result<u64>;

    fn call(&self, fate_id: &FateId, env: &E) -> Result<Option<Box<dyn Repo<E>>>>;
}
