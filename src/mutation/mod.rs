/// Conditions, writes and outcomes of a conditional mutation.
pub mod condition;
/// The builder that applies a conditional mutation to a store.
pub mod mutator;
