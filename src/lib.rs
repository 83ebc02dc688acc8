//! Confcraft library exports for the binary and for testing

pub mod backend;
pub mod core;

#[cfg(test)]
pub mod test_support;
