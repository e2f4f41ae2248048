//! # folio
//!
//! A from-scratch async data-fetching and caching client for portfolio
//! content APIs, written in Rust.
//!
//! Every content section of the site sits on the same small core: a cache
//! store keyed by resource identity, a query engine that deduplicates
//! concurrent requests and gates dependent fetches, an uncached mutation
//! path for the contact form, and a thin HTTP/1.1 transport underneath.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use folio::api;
//! use folio::cache::CacheStore;
//! use folio::client::{ClientConfig, ResourceClient};
//! use folio::query::QueryEngine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ResourceClient::new(ClientConfig::from_env()?);
//!     let engine = QueryEngine::new(client, CacheStore::new());
//!
//!     let mut projects = engine.query(api::projects_page(1, 10));
//!     let snapshot = projects.settled().await;
//!     if let Some(page) = snapshot.data_as::<api::Paginated<api::Project>>()? {
//!         for project in page.data {
//!             println!("{} — {}", project.title, project.subtitle);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// ── Core: transport, cache, and the engines on top ────────────────────────────
pub mod cache;
pub mod client;
pub mod http;
pub mod mutation;
pub mod query;

// ── Portfolio API surface: typed models and resource constructors ─────────────
pub mod api;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheEntry, CacheStore, FetchStatus, ResourceKey};
pub use client::{ClientConfig, ResourceClient, TransportError};
pub use mutation::{Mutation, MutationCallbacks, MutationEngine, MutationStatus};
pub use query::{Query, QueryEngine, QuerySnapshot, ResourceRequest};
