pub mod availability;
pub mod bridge;
pub mod config;
pub mod consts;
pub mod error;
pub mod flow;
pub mod mqtt;
pub mod node;
pub mod status;
pub mod switch;
pub mod topic;

#[cfg(test)]
mod testing;
