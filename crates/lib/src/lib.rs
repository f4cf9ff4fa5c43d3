//! mozo core library — channel and data ports, tenant session lifecycle,
//! conversational dispatch, and the HTTP trigger surface used by the CLI.

pub mod channels;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod gateway;
pub mod session;
