//! Dataset registry.
//!
//! Describes every source feed: where to fetch it, how it is bundled,
//! which entity kinds it yields, where those entities go, and which
//! dataset must be imported before it.

mod descriptor;
mod error;
mod hooks;
mod registry;

pub use descriptor::{BundleFormat, DataSetFormat, DatasetDescriptor, ImportDestination, Provider};
pub use error::{HookError, RegistryError};
pub use hooks::{
    ApiKeyQuery, BasicAuth, CredentialSource, DownloadHook, EnvCredentials, HookSpec, TokenLogin,
};
pub use registry::DatasetRegistry;
