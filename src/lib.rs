// ABOUTME: Root module for caravan - multi-agent travel planning engine.
// ABOUTME: Re-exports all public types from submodules.

pub mod aggregate;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod limiter;
pub mod llm;
pub mod prelude;
pub mod prompt;
pub mod registry;
pub mod router;

pub use error::CaravanError;
