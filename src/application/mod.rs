//! Application services layer: serialization, lookup and invalidation.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod import;
pub mod languages;
pub(crate) mod lock;
pub mod lookup;
pub mod module;
pub mod provider;
pub mod repos;
pub mod serializer;
pub mod service;
pub mod table;
