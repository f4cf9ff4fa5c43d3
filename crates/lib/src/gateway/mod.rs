//! Gateway: the thin HTTP trigger surface over the session registry.

mod server;

pub use server::{router, run_gateway, GatewayState};
