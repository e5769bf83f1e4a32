//! Terminal helpers for the SlimSnap command line
//!
//! - Status messages
//! - Size and savings formatting
//! - Progress bars wired to batch progress callbacks

#![warn(missing_docs)]

pub mod output;
pub mod progress;
