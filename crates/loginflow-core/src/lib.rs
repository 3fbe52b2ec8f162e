//! Core loginflow library (validation, auth client, session, login flow, config).

pub mod auth;
pub mod config;
pub mod flow;
pub mod form;
pub mod logging;
pub mod navigation;
pub mod screen;
pub mod session;
pub mod validation;
