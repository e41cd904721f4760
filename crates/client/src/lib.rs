//! HTTP client for the vizdiff build API.
//!
//! Async client using `reqwest`, authenticated with the project token.
//! Request and response bodies are the JSON:API documents from
//! `vizdiff-protocol`.

pub mod client;
pub mod config;

pub use client::{Client, Error};
pub use config::{ClientConfig, DEFAULT_API_URL};
