//! SQLite backend for the Duka engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
