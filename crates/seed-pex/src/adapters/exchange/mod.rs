//! # Seed Exchange
//!
//! The base peer-exchange behaviour in seed mode: answer address requests
//! and hang up, record inbound peers' listen addresses, and periodically
//! crawl the network to keep the book fresh.

mod config;
mod seed;

pub use config::ExchangeConfig;
pub use seed::SeedExchange;

#[cfg(test)]
mod tests;
