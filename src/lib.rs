//! # gatehouse
//!
//! Session and database glue for a web application.
//!
//! The server half lazily opens one shared database connection per process
//! (`db`) and reports its health over HTTP (`routes`). The client half keeps
//! the signed-in user in sync between locally cached credentials and the
//! backend (`client`).

pub mod client;
pub mod config;
pub mod db;
pub mod routes;
pub mod state;
