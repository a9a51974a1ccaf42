//! Job handlers
//!
//! One module per job type consumed from the queue. Handlers do the work
//! and report errors; acknowledging and retrying is the consumer's call.

pub mod playlist_export;
