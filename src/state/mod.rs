/// State management module
///
/// This module handles all viewer state, including:
/// - Shared data structures (data.rs)
/// - Directory scanning and filename ordering (index.rs)
/// - The grid of cells rebuilt on every reload (viewer.rs)

pub mod data;
pub mod index;
pub mod viewer;
