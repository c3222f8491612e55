//! Content-tree backed localization.
//!
//! Translations live as nodes in a hierarchical content store. The provider
//! renders them into a single XML document, serves lookups from a parsed
//! snapshot of it and reloads whenever translation content changes, telling
//! the other processes of the deployment to do the same.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
