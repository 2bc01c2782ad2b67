/// Table states and table/namespace lock bookkeeping.
pub mod catalog;
/// Table ids, namespace ids and tablet extents.
pub mod extent;
/// Tablet metadata records and how to read them.
pub mod metadata;
/// Asynchronous conditional mutation of many tablets.
pub mod mutator;
/// Keys and key ranges.
pub mod range;
