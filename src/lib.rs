// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod classifier;
pub mod config;
pub mod filter;
pub mod kinematics;
pub mod mapper;
pub mod phase;
pub mod runtime;
pub mod sensor;
pub mod session;
pub mod util;
