/// Retrying a step's readiness check until it can be called.
pub mod readiness;
/// Setting the availability of a range of tablets.
pub mod set_availability;
