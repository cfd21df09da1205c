//! Connection identity and outbound delivery for Gridforge.
//!
//! This crate handles the two things every other layer needs to know
//! about a connection:
//!
//! 1. **Authentication**: who is behind it ([`Authenticator`], [`Identity`])
//! 2. **Delivery**: how to push messages to it without blocking
//!    ([`ClientHandle`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← holds ClientHandles, broadcasts to members
//!     ↕
//! Session Layer (this crate)  ← identity + bounded outbound queue
//!     ↕
//! Protocol Layer (below)  ← ClientId, ServerMessage, JsonCodec
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod client;
mod error;

pub use auth::{Authenticator, Identity, StaticTokenAuthenticator};
pub use client::{ClientHandle, OutboundQueue};
pub use error::SessionError;
