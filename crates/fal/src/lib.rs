//! Client for the fal.ai queue API (image generation and editing).
//!
//! [`FalClient`] wraps the three operations the rest of the system
//! needs: submit a job, poll its status, and fetch its result. The
//! [`InferenceService`] trait is the seam the api crate (and its
//! tests) program against.

pub mod client;
pub mod service;

pub use client::{FalClient, FalError};
pub use service::{InferenceService, PollOutcome, Submission};
