pub mod error;
pub mod hookrelay;
