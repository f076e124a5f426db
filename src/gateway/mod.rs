//! Resource gateway: the HTTP protocol both ends of a sync speak.
//!
//! The server side exposes a `ResourceStore` (local filesystem or object
//! storage); the client side implements the synchronizer's `Endpoint`.

pub mod client;
pub mod local;
pub mod object;
pub mod server;
pub mod store;

pub use client::HttpEndpoint;
pub use local::LocalStore;
pub use object::ObjectStore;
pub use server::{build_router, serve};
pub use store::{ContentMeta, ContentStream, DirMeta, ResourceStore, StoreError, StoredContent};
