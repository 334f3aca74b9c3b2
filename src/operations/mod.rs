//! Operations: the import pipeline and its stages

pub mod import;
