//! Generation stages: topic, article body and labels, illustration.

pub mod content;
pub mod image;
pub mod topic;
