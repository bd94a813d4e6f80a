//! HTTP request handlers. Each one resolves the actor, calls the engine and
//! maps its result; none of them touch storage directly.

pub mod auth;
pub mod comments;
pub mod health;
pub mod members;
pub mod notifications;
pub mod projects;
pub mod tasks;
pub mod users;
