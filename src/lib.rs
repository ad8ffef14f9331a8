pub mod cli;
pub mod config;
pub mod error;
pub mod keywords;
pub mod normalizer;
pub mod pipeline;
pub mod proxy;
pub mod scanner;
pub mod store;
