//! These models represent the objects passed between the agent loop and a backend
//!
//! There are two directions to care about:
//! - messages, sent from the agent loop to the backend (flattened to text on the way out)
//! - stream chunks, parsed out of the backend's raw text reply
//!
//! Incoming messages follow the shape agent loops already use (a role plus either a
//! bare string or a list of typed items), so callers can hand over their history as-is.
pub mod chunk;
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
