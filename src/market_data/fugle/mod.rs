pub mod client;
pub mod parse;

pub use client::{FugleClient, DEFAULT_BASE_URL};
