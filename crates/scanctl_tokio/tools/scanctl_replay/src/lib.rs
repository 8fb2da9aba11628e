//! Replays recorded engine detection payloads through a `LifecycleController`
//! backed by the scripted engine, and reports what the host would observe.

pub mod config;
pub mod replay;
