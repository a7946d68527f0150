pub mod config;
pub mod credential_store;
pub mod error;
pub mod learning_api_client;
pub mod session_history_repository;
