//! snapfeed - a photo sharing server and the client state layer that drives it
//!
//! The server half exposes accounts with bearer sessions, posts with images,
//! likes, comments and avatar uploads over a JSON API. The `client` module is
//! a typed state container that talks to that API.

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod uploads;
pub mod wire;
