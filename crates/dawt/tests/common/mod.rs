//! Shared test utilities for dawt integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a real `TranscriptionService` to scripted fakes
//! - Fake fetcher, speech-to-text and translation engines

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::{HarnessBuilder, TestHarness};
