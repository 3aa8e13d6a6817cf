//! Source processors

pub mod library;
