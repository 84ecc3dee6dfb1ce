//! Remote backend: a PostgREST table behind the [`StorageAdapter`] contract.
//!
//! [`StorageAdapter`]: crate::storage::StorageAdapter

mod adapter;
pub mod codec;
mod http;
mod retry;
mod transport;

pub use adapter::{RemoteAdapter, UpdateMode};
pub use codec::{camel_to_snake, is_translatable, snake_to_camel, FieldCodec, Row};
pub use http::HttpTransport;
pub use retry::{with_retry, AttemptOutcome, AttemptRecord, RetryLog, RetryPolicy};
pub use transport::{RestError, RestTransport, SelectQuery};
