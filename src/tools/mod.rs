//! Tool implementations offered to team agents

pub mod document;
pub mod search;
