pub mod errors;
pub mod config;
pub mod data_store;
pub mod storage;
pub mod mutation;
pub mod fate;
pub mod tablets;
pub mod ops;
pub mod moira;
pub mod arrow_utils;

// Re-export key types and structs for easier access
pub use config::MoiraConfig;
pub use errors::{MoiraError, Result};
pub use moira::{Moira, prelude};
pub use storage::RecordStore;
pub use mutation::condition::{Condition, ConditionalMutation, MutationStatus};
pub use mutation::mutator::ConditionalMutator;
pub use fate::id::{FateId, FateInstanceType};
pub use fate::mutator::FateMutator;
pub use fate::repo::Repo;
pub use fate::status::TStatus;
pub use ops::set_availability::SetTabletAvailability;
