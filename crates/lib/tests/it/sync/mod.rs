//! Sync tests
//!
//! Networks of coordinators joined by in-process channel links.

mod helpers;
