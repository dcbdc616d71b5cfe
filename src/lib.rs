pub mod adapters;
pub mod address;
pub mod api;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod persistence;
pub mod provider;
pub mod quota;
pub mod registry;
pub mod selector;
pub mod upstream;

pub use address::Address;
pub use api::{GeoResult, GeoRouter};
pub use error::{ApiError, DispatchError, PersistenceError};
