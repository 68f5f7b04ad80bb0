// handlers/mod.rs - HTTP handlers
//
// Handlers only shape requests and responses. Request bodies and query
// strings are validated here, everything else is delegated to the
// repositories in `crate::models`.
pub mod auth;
pub mod companies;
pub mod jobs;
pub mod system;
