pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod image_processing;
pub mod logging;
pub mod mcp_server;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod storage;
pub mod tools;
