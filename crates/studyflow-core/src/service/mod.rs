//! Business logic services (use cases).
//!
//! Services shape engine results for the CLI and HTTP surfaces. They depend
//! on traits (ports) -- never on concrete infrastructure implementations.

pub mod session;
