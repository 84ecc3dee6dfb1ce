pub mod factory;
pub mod local;
pub mod remote;
pub mod traits;

pub use factory::{AdapterFactory, HttpConnector, RemoteConnector, SharedConnector};
pub use local::{LocalAdapter, LocalStore};
pub use remote::{RemoteAdapter, UpdateMode};
pub use traits::StorageAdapter;
