//! Directive management for AI coding agents — tiered resolution, search,
//! and sync via MCP.
//!
//! Dirigent is an [MCP](https://modelcontextprotocol.io/) server that manages
//! *directives*: markdown documents with an embedded structured block that
//! tell a coding agent how to perform a task. Directives resolve through
//! three tiers, highest priority first:
//!
//! | Tier | Location | Role |
//! |------|----------|------|
//! | **Project** | `<project>/.ai/directives/` | Team-shared, checked in |
//! | **User** | `~/.dirigent/directives/` | Personal, cross-project |
//! | **Registry** | SQLite database | Published, shared, versioned |
//!
//! # Architecture
//!
//! - **Resolution**: project → user → registry walk with a
//!   content-hash-validated cache; semver constraints apply to registry
//!   fetches
//! - **Search**: keyword scoring over local tiers merged with server-side
//!   registry search onto one 0-100 scale
//! - **Sync**: lockfile-tracked installs, publish with structural validation,
//!   per-tier delete reporting, and bulk update of the core set
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`directive`] — Core engine: parsing, resolution, scoring, search, and sync
//! - [`registry`] — Registry storage trait and the SQLite implementation
//! - [`semver`] — Version parsing and constraint matching
//! - [`server`] — MCP server wiring for stdio and HTTP transports

pub mod config;
pub mod directive;
pub mod error;
pub mod registry;
pub mod semver;
pub mod server;
pub mod tools;
