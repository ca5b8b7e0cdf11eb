//! Subscribed source management for feedwatch.

mod repository;
mod types;

pub use repository::SourceRepository;
pub use types::{NewSource, Source, SourceKind};
