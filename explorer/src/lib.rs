// lib.rs - Command-line and HTTP front ends for the segment-tree explorer

pub mod http_server;
pub mod report;

pub use http_server::{routes, start_server, ServerState};
