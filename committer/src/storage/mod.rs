//! Storage access on top of [`object_store`].

pub mod executor;
mod filesystem;

pub use filesystem::ObjectStoreStorageHandler;
