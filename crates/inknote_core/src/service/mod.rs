//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store and image cache calls into use-case level APIs.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod ink;
pub mod notebook_service;
pub mod page_session;
