pub mod assembler;
pub mod controller;
pub mod engine;
pub mod error;
pub mod model;
pub mod planner;
pub mod policy;
pub mod reader;
mod worker;

#[cfg(test)]
pub(crate) mod testing;
