//! Kalon Explorer - a read-only client for the Kalon block explorer API
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Backend Access
//! - [`client`] - HTTP resource client and the [`client::Backend`] seam
//! - [`models`] - Wire types and the response envelope
//! - [`resource`] - Resource keys and typed payloads
//!
//! ## Synchronization
//! - [`scheduler`] - Polling scheduler with reference-counted subscriptions
//! - [`cache`] - Resource state, staleness policy and block cache
//!
//! ## Navigation
//! - [`search`] - Query classification and resolution
//! - [`pagination`] - Paged request building and window derivation
//! - [`view`] - Owned view state (listings, dashboard)
//!
//! ## Presentation
//! - [`format`] - Pure display formatters
//! - `cli` - Terminal tables (feature `cli`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Backend Access
// ============================================================================
pub mod client;
pub mod models;
pub mod resource;

// ============================================================================
// Synchronization
// ============================================================================
pub mod cache;
pub mod scheduler;

// ============================================================================
// Navigation
// ============================================================================
pub mod pagination;
pub mod search;
pub mod view;

// ============================================================================
// Presentation
// ============================================================================
#[cfg(feature = "cli")]
pub mod cli;
pub mod format;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
