//! Integration test suite modules.

mod conflict;
mod end_to_end;
