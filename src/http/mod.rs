/// Module formatting the response.
pub mod response;
