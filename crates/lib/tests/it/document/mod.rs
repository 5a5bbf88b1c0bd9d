//! Document API tests
//!
//! Path semantics of `get`/`set`/`delete` and the listener contract.

mod listeners;
mod paths;
