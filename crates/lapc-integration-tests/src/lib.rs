//! End-to-end scenario tests for the LAPC proxy
//!
//! These tests drive `lapc-pump`'s client-frame and upstream-frame
//! dispatch directly against a shared `PumpContext`, the way the real
//! pump does, but with a fake upstream responder closure standing in for
//! the subprocess boundary (no real child process is spawned).
