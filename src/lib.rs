pub mod config;
pub mod conversion;
pub mod document;
pub mod error;
pub mod master_data;
pub mod repository;
pub mod service;
pub mod status;
pub mod store;
pub mod types;
pub mod utils;
