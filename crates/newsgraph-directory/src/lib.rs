pub mod client;

pub use client::{HttpDirectoryClient, SIMILARITY_THRESHOLD};
