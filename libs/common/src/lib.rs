//! Common library for the forum client
//!
//! This crate provides functionality shared by the forum crates: client
//! configuration, the key-value store used to persist credentials, and the
//! error types of both.
//!
//! ```rust,no_run
//! use common::config::ClientConfig;
//! use common::store::{FileStore, KeyValueStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env()?;
//!     if let Some(path) = &config.session_file {
//!         let store = FileStore::new(path);
//!         println!("Saved token: {:?}", store.get("TOKEN").await?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod store;
