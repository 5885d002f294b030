//! Caching relay for the TDX API.
//!
//! Exposes the upstream paths this crate uses. Requests carrying the
//! canonical query are answered from the endpoint cache with the upstream
//! body unmodified; anything else is redirected to the origin.

mod routes;
mod state;

pub use routes::{AppError, create_router};
pub use state::RelayState;
