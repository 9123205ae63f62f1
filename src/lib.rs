//! # codequarry
//!
//! A multi-tenant codebase chunk store for retrieval-backed code Q&A.
//!
//! codequarry ingests source-code repositories, splits them into
//! overlapping line-window chunks, fingerprints each chunk with a
//! deterministic content-hash vector, and stores everything in one
//! isolated collection per codebase. Questions are answered by ranking a
//! tenant's chunks against the query fingerprint and handing the best
//! matches to an external answering service.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌─────────────────┐
//! │ Repository │──▶│  Pipeline    │──▶│ Tenant stores    │
//! │ (git)      │   │ Chunk+Embed │   │ codebase_<id>/   │
//! └────────────┘   └─────────────┘   └────────┬────────┘
//!                                             │
//!                            question ──▶ query (cosine)
//!                                             │
//!                                    ┌────────▼────────┐
//!                                    │ Answering svc    │
//!                                    │ (OpenRouter)     │
//!                                    └─────────────────┘
//! ```
//!
//! Tenants never share state: each codebase id maps to its own
//! directory and SQLite collection, destroyed as a unit. Replacing a
//! tenant's chunks on refresh is a documented two-phase operation, and
//! teardown survives transient file locks via bounded retry with a
//! rename fallback.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`errors`] | Typed error taxonomy |
//! | [`chunk`] | Overlapping line-window splitter |
//! | [`embedding`] | Deterministic fallback vectorizer |
//! | [`store`] | Per-tenant chunk collection (SQLite) |
//! | [`registry`] | Tenant routing and handle caching |
//! | [`reclaim`] | Resilient on-disk teardown |
//! | [`ingest`] | Repository ingestion pipeline |
//! | [`repo`] | Git repository source + file scanning |
//! | [`answer`] | Answering service client |
//! | [`traits`] | Collaborator seams |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod reclaim;
pub mod registry;
pub mod repo;
pub mod store;
pub mod traits;
