#![forbid(unsafe_code)]

//! # counselor
//!
//! A doctrine-grounded decision counsel engine. Books are ingested through
//! a resumable two-phase pipeline into a permissioned per-domain vector
//! store; decision queries route through quick, normal, or war
//! deliberation; ministers argue from retrieved doctrine under a hard ACL;
//! a tribunal resolves typed conflicts; and every decision and outcome
//! lands in an append-only ledger whose patterns calibrate future advice.
//!
//! The sovereign decides. The engine only counsels.

pub mod chunking;
pub mod config;
pub mod debate;
pub mod embed;
pub mod gateway;
pub mod ingest;
pub mod ledger;
pub mod prompts;
pub mod registry;
pub mod retrieve;
pub mod router;
pub mod synthesize;
pub mod types;
pub mod vector_store;
pub mod war;

pub use config::Config;
pub use embed::{EmbedPool, Embedder, HashEmbedder, HttpEmbedder};
pub use gateway::{EndpointAdapter, GatewayConfig, LlmGateway, RetryingGateway};
pub use ingest::{IngestReport, Ingestor};
pub use ledger::Ledger;
pub use registry::BookRegistry;
pub use router::{CounselReply, CounselRequest, Engine, EngineError};
pub use types::{Domain, MinisterId, Mode, Stance};
pub use vector_store::VectorStore;
