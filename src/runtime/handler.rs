use crate::runtime::listen_point::ListenPoint;

/// A trait that determines what the server does with each established connection.
pub trait Handler<L: ListenPoint>: Send + Sync + 'static {
    /// Serves one connection. The server closes it once this returns.
    ///
    /// # Errors
    /// Throws the listen point's error if reading or writing the connection fails.
    fn call(
        &self,
        listen_point: &L,
        connection: &mut L::Connection,
    ) -> impl Future<Output = Result<(), L::Error>> + Send;
}
