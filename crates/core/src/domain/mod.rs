pub mod contract;
pub mod profile;
pub mod recommendation;
pub mod result;
pub mod scenario;
pub mod snapshot;
