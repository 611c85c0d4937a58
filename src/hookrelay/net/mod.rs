pub mod server;
pub mod webhook;
