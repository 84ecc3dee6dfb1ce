pub mod error;
pub mod types;

pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod diagnostics;
pub mod events;
pub mod migration;
pub mod selection;
pub mod stack;
pub mod storage;

pub use error::{Result, StorageError};
pub use types::{Backend, Record};
