//! Quill - a social blogging backend
//!
//! Users publish Markdown articles, tag them, like, bookmark and comment on
//! them, and follow other authors. Storage is SQLite or MySQL through SQLx,
//! or an in-memory store.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
