//! Pipeline stages for one submit action.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and the session only wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! load ──▶ transform ──▶ encode ──▶ submit
//! (bytes)   (edits)      (JPEG/PNG) (HTTP)
//! ```
//!
//! 1. [`load`]      : decode an upload and capture its ICC profile
//! 2. [`transform`] : brightness → contrast → crop *or* margin expand
//! 3. [`encode`]    : JPEG/PNG bytes, then base64 or a staged temp file
//! 4. [`submit`]    : precondition checks, fixed-shape request, response
//!    normalisation; the only stage with network I/O

pub mod encode;
pub mod load;
pub mod submit;
pub mod transform;
