/// Module containing certificate sources and the per-listen-point certificate store
pub mod certificate;
/// Module containing the process-wide crypto context
pub mod crypto;
/// Module containing the error types of the TLS layer
pub mod error;
/// Module containing the resumable handshake
pub mod handshake;
/// Module containing the fixed cipher-suite policy
pub mod policy;
/// Module containing the record I/O bridge of established connections
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
