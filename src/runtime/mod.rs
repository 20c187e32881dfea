/// Module containing the raw connection and the request factory
pub mod connection;
/// Module containing the handler
pub mod handler;
/// Module containing the listen point abstraction and its TLS implementation
pub mod listen_point;
/// Module containing the logic for the server
pub mod server;
