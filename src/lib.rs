//! # Knowledge Store
//!
//! A local-first embedding store and retrieval core for code-assistance
//! tools: persist project files as embedded documents, search them by
//! cosine similarity, and merge the results with the user's live editing
//! context before handing everything to a language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │  Ingestion  │──▶│  Embedding   │──▶│  SQLite   │
//! │  Pipeline   │   │  Store       │   │  (1/proj) │
//! └──────┬──────┘   └──────▲───────┘   └───────────┘
//!        │                 │
//! ┌──────▼──────┐   ┌──────┴───────┐   ┌───────────┐
//! │    Index    │   │   Context    │◀──│   Live    │
//! │  Registry   │   │   Composer   │   │  editor   │
//! └─────────────┘   └──────────────┘   └───────────┘
//! ```
//!
//! Writes flow through the ingestion pipeline in the background, gated by
//! the registry's seven-day staleness window. Reads go through the
//! composer, which merges store search hits with attached files and a
//! caret-centered window of the focused buffer.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and on-disk layout |
//! | [`models`] | Document model and metadata keys |
//! | [`filter`] | Structured deletion filters |
//! | [`embedding`] | Embedding seam and vector math |
//! | [`store`] | Durable embedding store with similarity search |
//! | [`registry`] | Staleness bookkeeping per project |
//! | [`selector`] | Path eligibility predicate |
//! | [`ingest`] | Batched ingestion pipeline |
//! | [`progress`] | Indexing progress reporting |
//! | [`workspace`] | Live editor state and caret windows |
//! | [`compose`] | Merged retrieval results |
//! | [`db`] | SQLite connection and schema |
//! | [`error`] | Error taxonomy |

pub mod compose;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod registry;
pub mod selector;
pub mod store;
pub mod workspace;

pub use compose::{ContentOrigin, ContextComposer, RetrievedContent};
pub use embedding::Embedder;
pub use error::{Result, StoreError};
pub use filter::DocumentFilter;
pub use ingest::{index_project, DocumentSink, IngestPipeline, IngestReport, StoreSink};
pub use models::{Document, DocumentMatch};
pub use registry::IndexRegistry;
pub use selector::FileSelector;
pub use store::EmbeddingStore;
pub use workspace::{OpenBuffer, WorkspaceState};
