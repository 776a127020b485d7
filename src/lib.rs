pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod routes;
pub mod services;
pub mod sweeper;
pub mod websocket;
pub mod ws;
