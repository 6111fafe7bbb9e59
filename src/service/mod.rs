pub mod registry;

pub use registry::{ServiceProfile, ServiceRegistry};
