//! Pure domain types: identifiers, the cron compiler, and the job record
//! model. Nothing in here touches the filesystem or spawns processes.

pub mod cron;
pub mod job;
pub mod run;
pub mod types;
