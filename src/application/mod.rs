// Application layer - use cases and orchestration on top of the store.

mod service;

pub use service::*;
