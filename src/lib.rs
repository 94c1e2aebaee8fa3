pub mod broker;
pub mod config;
pub mod error;
pub mod fetch;
pub mod publish;
pub mod table;
