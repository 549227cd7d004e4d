//! State module for tracking crawl progress
//!
//! A crawl run moves through a fixed sequence of phases, see [`CrawlPhase`].

mod crawl_phase;

pub use crawl_phase::CrawlPhase;
