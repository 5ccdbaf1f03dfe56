pub mod app;
pub mod cli;
pub mod config;
pub mod executor;
pub mod hosts;
pub mod output;
pub mod prober;
pub mod runner;
pub mod utils;

#[cfg(test)]
mod tests;
