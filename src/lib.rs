//! # typoscout
//!
//! Domain-availability and typo-variant reconnaissance.
//!
//! The library half of the crate is the lookup pipeline: a dispatcher that
//! routes each domain to one of four backends (RDAP over HTTPS, WHOIS over
//! TCP/43, iterative DNS NS resolution from the roots, or a user-configured
//! HTTP endpoint), plus the durable bulk scheduler built on top of it. The
//! binary half (`server` feature) wires the pipeline into an axum HTTP and
//! websocket surface.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use typoscout::dispatcher;
//!
//! #[tokio::main]
//! async fn main() {
//!     let outcome = dispatcher::lookup("example.com", "whoisQuery").await;
//!     match outcome.error {
//!         None => println!("taken, registrar: {}", outcome.info.registrar),
//!         Some(err) if err.is_not_found() => println!("free"),
//!         Some(err) => println!("lookup failed: {}", err),
//!     }
//! }
//! ```

pub mod bulk;
pub mod config;
pub mod custom_api;
pub mod dispatcher;
pub mod dns_resolver;
pub mod domain_tools;
pub mod errors;
pub mod events;
pub mod fanout;
pub mod logging;
pub mod rdap;
pub mod record;
pub mod register_task;
pub mod registrar;
pub mod store;
pub mod tld_tables;
pub mod typo;
pub mod web_check;
pub mod whois;
pub mod whois_parser;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod auth;
#[cfg(feature = "server")]
pub mod metrics;
#[cfg(feature = "server")]
pub mod ws;

// Re-export the main types for easy access
pub use errors::{LookupError, ServiceError};
pub use record::{DomainInfo, LookupOutcome, QueryResult, RegisterStatus};
pub use store::RedisStore;
