//! FFI bridge crate for the InkNote UI host.

pub mod api;
