// HTTP surface for the media migration pipeline: admin batch trigger,
// public lazy migration and image proxy, media store diagnostics

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;

pub use server::ApiServer;
pub use state::AppState;
