//! Global registries for commands and services.
//!
//! Both registries are process-wide singletons with explicit swap hooks so
//! tests can install a fresh pair without leaking state between cases.

pub mod command;
pub mod service;

pub use command::{
    global_command_registry, set_global_command_registry, Command, CommandRegistry,
};
pub use service::{
    get_typed_service, global_service_registry, set_global_service_registry, Service,
    ServiceRegistry,
};
