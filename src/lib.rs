///! Dynamic-DNS hostname renewal by driving the provider web console.
///!
///! One run logs into the provider, renews every managed hostname, reads
///! back the remaining validity of each, and hands the computed next-run
///! date to an external scheduler script.

pub mod config;
pub mod logging;
pub mod renew;
pub mod session;
