//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation. Every persisted write
//! goes through `AppState::store_json`, which announces the change on the
//! notification bus.

pub mod activity;
pub mod admin;
pub mod bridge;
pub mod compare;
pub mod conversation;
pub mod dashboard;
pub mod favorites;
pub mod images;
pub mod notify;
pub mod responder;
pub mod site;
