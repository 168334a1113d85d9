//! Command implementations

pub mod delete;
pub mod factors;
pub mod list;
pub mod refresh;
pub mod register;
pub mod resolve;
pub mod scan;
pub mod serve;
pub mod show;
