//! Core domain and configuration for helpdevil
//!
//! This crate holds the pieces every other crate builds on:
//! - **Domain** (`domain`) - teams, knowledge-base articles, editable fields
//! - **Configuration** (`config`) - layered config with fail-fast validation
//!
//! The domain stays deliberately small: one record per team, a flat list of
//! articles inside it, read-modify-write with last-writer-wins semantics.

pub mod config;
pub mod domain;

pub use domain::team::{Article, ArticleId, EditField, Team, TeamId};
