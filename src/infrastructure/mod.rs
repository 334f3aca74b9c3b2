//! Infrastructure: catalog database and background-job submission

pub mod database;
pub mod jobs;
