//! Tests for the trampoline
//!
//! Organized by feature area

mod failure_tests;
mod helpers;
mod nesting_tests;
