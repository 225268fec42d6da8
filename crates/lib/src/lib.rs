//! Hush core library: backend API client, mode registry, message pipeline, and session store
//! shared by the Hush front ends.

pub mod api;
pub mod config;
pub mod export;
pub mod init;
pub mod modes;
pub mod pipeline;
pub mod session;
