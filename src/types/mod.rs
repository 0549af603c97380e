//! Shared request and response types.

mod pagination;
mod response;

pub use pagination::PageWindow;
pub use response::{Accepted, Created, MessageResponse, NoContent};
