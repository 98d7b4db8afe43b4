pub mod auth;
pub mod chatbot;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod models;
pub mod notify;
pub mod otp;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod storage;
