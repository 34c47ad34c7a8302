//! Client-side state sync engine: a reactive mirror of remotely supervised services and
//! directories, reconciled through a command channel and an out-of-band push channel.

mod command;
mod error;
mod models;
mod push;
mod registry;
mod resource;
pub mod testing;
pub mod wire;

pub use command::{Backend, Command, CommandFacade};
pub use error::{CommandError, CommandResult, Result, SyncError, WireError};
pub use models::{
    InstallFile, Metrics, PushRecord, ResourceConfig, ResourceKind, ResourcePatch, Status,
};
pub use push::{Batch, PushChannel, Subscription, SERVICES_UPDATE};
pub use registry::{Counts, Registry, RegistryOptions};
pub use resource::{Resource, ResourceState};
