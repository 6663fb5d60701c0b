//! API module which contains all the routes for the application.

pub mod auth;
pub mod route;
