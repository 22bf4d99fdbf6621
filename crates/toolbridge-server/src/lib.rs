pub mod app_state;
pub mod demo;
pub mod handlers;
pub mod router;
pub mod session;
pub mod stdio;
