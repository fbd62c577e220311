//! Caller-facing dispatch client.
//!
//! Ties the pieces together: router → adapter → transport → adapter (or stream reader).
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
pub mod stream;

pub use builder::DispatchClientBuilder;
pub use core::DispatchClient;
pub use stream::TurnStream;
