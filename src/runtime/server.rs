use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::Notify,
    task::JoinHandle,
    time::{sleep, timeout},
};

use crate::runtime::{handler::Handler, listen_point::ListenPoint};

/// How long a connection may take to become established before it is dropped.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A struct representing a running server, containing the state of the server.
#[derive(Debug)]
pub struct Server<H> {
    server_state: Arc<ServerState<H>>,
    task: JoinHandle<()>,
}

/// A struct representing the state of a server: whether it has been closed and the handler.
#[derive(Debug)]
struct ServerState<H> {
    closed: AtomicBool,
    shutdown: Notify,
    handler: Arc<H>,
}

impl<H> Server<H> {
    /// Stops accepting new connections. Connections already being served run to completion.
    pub fn close(&self) {
        self.server_state.closed.store(true, Ordering::SeqCst);
        self.server_state.shutdown.notify_one();
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.server_state.closed.load(Ordering::SeqCst)
    }

    /// Waits for the accept loop to finish after `close`.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "accept loop panicked");
        }
    }
}

impl<H> ServerState<H> {
    /// Called on a `ServerState`, accepting connections until the server is closed.
    ///
    /// The listen point is freed once the loop ends and no connection uses it anymore.
    async fn listen<L: ListenPoint>(self: Arc<Self>, listen_point: Arc<L>)
    where
        H: Handler<L>,
    {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                tracing::info!("server closed, no longer accepting connections");
                break;
            }

            let accepted = tokio::select! {
                () = self.shutdown.notified() => continue,
                accepted = listen_point.accept_raw() => accepted,
            };

            match accepted {
                Ok(incoming) => {
                    let listen_point = Arc::clone(&listen_point);
                    let handler = Arc::clone(&self.handler);
                    tokio::spawn(async move {
                        handle(&*listen_point, &*handler, incoming).await;
                    });
                }
                Err(error) => {
                    if self.closed.load(Ordering::SeqCst) {
                        break;
                    }
                    tracing::warn!(%error, "accepting connection failed");
                    sleep(Duration::from_millis(50)).await;
                }
            }
        }

        match Arc::try_unwrap(listen_point) {
            Ok(mut listen_point) => listen_point.free(),
            Err(_) => tracing::debug!("listen point still in use, freed with the last connection"),
        }
    }
}

/// Serves connections accepted by `listen_point` with `handler` until the server is closed.
///
/// Must be called from within a tokio runtime.
pub fn serve<L, H>(listen_point: L, handler: Arc<H>) -> Server<H>
where
    L: ListenPoint,
    H: Handler<L>,
{
    let state = ServerState {
        handler,
        closed: AtomicBool::new(false),
        shutdown: Notify::new(),
    };
    let state_for_main = Arc::new(state);
    let state_for_task = Arc::clone(&state_for_main);
    let task = tokio::spawn(async move {
        state_for_task.listen(Arc::new(listen_point)).await;
    });
    Server {
        server_state: state_for_main,
        task,
    }
}

/// Establishes one connection within `HANDSHAKE_TIMEOUT`, hands it to the handler, then closes it.
async fn handle<L: ListenPoint, H: Handler<L>>(listen_point: &L, handler: &H, incoming: L::Incoming) {
    let Ok(established) = timeout(HANDSHAKE_TIMEOUT, listen_point.establish(incoming)).await else {
        tracing::warn!(timeout = ?HANDSHAKE_TIMEOUT, "handshake timed out");
        return;
    };
    let Some(mut connection) = established else {
        return;
    };

    if let Err(error) = handler.call(listen_point, &mut connection).await {
        tracing::warn!(%error, "connection ended with an error");
    }
    listen_point.close(&mut connection);
}
