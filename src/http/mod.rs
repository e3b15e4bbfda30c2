//! Traffic serving: TLS proxy listener and plaintext redirect listener.

pub mod proxy;
pub mod redirect;
pub mod server;

pub use server::{ServeError, Server};
