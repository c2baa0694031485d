//! MedRelay Session - Authentication With Bounded Recovery
//!
//! # Layers
//!
//! - `RetryPolicy` / `SessionRecoveryManager`: fixed-backoff retry that only
//!   repeats transient failures
//! - `SessionManager`: sign-in plus profile lookup under recovery
//! - `HttpIdentityProvider`: `IdentityProvider` over a hosted auth backend

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod http;
pub mod manager;
pub mod recovery;
pub mod retry;

pub use http::HttpIdentityProvider;
pub use manager::{AuthenticatedSession, SessionManager};
pub use recovery::SessionRecoveryManager;
pub use retry::{RetryPolicy, Transient};
