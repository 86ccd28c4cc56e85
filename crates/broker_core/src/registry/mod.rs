pub mod service;
pub mod worker;

pub use service::{ServiceRecord, ServiceRegistry};
pub use worker::{WorkerRecord, WorkerRegistry};
