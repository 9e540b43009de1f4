//! Email delivery implementations.

pub mod client;

pub use client::HttpEmailSender;
