/// Transaction identifiers.
pub mod id;
/// Conditional mutations of a transaction record.
pub mod mutator;
/// The step interface run by the executor.
pub mod repo;
/// Reservation tokens and lock identities.
pub mod reservation;
/// Column layout of transaction records.
pub mod schema;
/// Transaction lifecycle statuses.
pub mod status;
/// Reservation-gated transaction operations.
pub mod store;
