//! # HTTPS Server
//!
//! This binary serves a static page over the TLS listen point of the library in this crate.
//!
//! Usage: `httpsserver [settings file]`, defaulting to `https.toml`. Stop it with Ctrl-C.
use std::{sync::Arc, time::Instant};

use httpsserver::{
    config::ServerSettings,
    http::response::{StatusCode, html_response},
    runtime::{
        connection::{Connection, RequestFactory},
        handler::Handler,
        listen_point::{ListenPoint, TlsListenPoint},
        server::serve,
    },
    tls::{error::SessionError, session::TlsConnection},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SETTINGS: &str = "https.toml";
const MAX_HEAD: usize = 8 * 1024;

/// What the demo keeps per connection.
#[derive(Debug)]
struct DemoRequest {
    accepted_at: Instant,
    requests: usize,
}

#[derive(Debug)]
struct DemoFactory;

impl RequestFactory for DemoFactory {
    type Request = DemoRequest;

    fn create(&self, _connection: &Connection) -> DemoRequest {
        DemoRequest {
            accepted_at: Instant::now(),
            requests: 0,
        }
    }
}

#[derive(Debug)]
struct StaticPage;

/**
 * Example implementation. It only waits for the end of the request head and looks at the target,
 * anything more is up to a real HTTP layer.
 */
impl Handler<TlsListenPoint<DemoFactory>> for StaticPage {
    async fn call(
        &self,
        listen_point: &TlsListenPoint<DemoFactory>,
        connection: &mut TlsConnection<DemoRequest>,
    ) -> Result<(), SessionError> {
        let mut head: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|window| window == b"\r\n\r\n") {
            if head.len() > MAX_HEAD {
                let response = html_response(
                    StatusCode::RequestHeaderFieldsTooLarge,
                    "<html><body><h1>Request Header Fields Too Large</h1></body></html>",
                );
                listen_point.write(connection, &response.to_bytes()).await?;
                return Ok(());
            }
            match listen_point.read(connection, &mut buf).await {
                Ok(read) => head.extend_from_slice(&buf[..read]),
                Err(SessionError::PeerClosed) => return Ok(()),
                Err(e) => return Err(e),
            }
        }

        let target = head
            .split(|byte| *byte == b' ')
            .nth(1)
            .map(String::from_utf8_lossy)
            .unwrap_or_default();
        let response = match &*target {
            "/" => {
                let body = format!(
                    "<html><body><h1>All good!</h1><p>{} over {:?}</p></body></html>",
                    connection.id(),
                    connection.protocol_version()
                );
                html_response(StatusCode::Ok, &body)
            }
            "" => html_response(StatusCode::BadRequest, "<html><body><h1>Bad Request</h1></body></html>"),
            _ => html_response(StatusCode::NotFound, "<html><body><h1>Not Found</h1></body></html>"),
        };
        listen_point.write(connection, &response.to_bytes()).await?;

        let connection_id = connection.id();
        if let Some(request) = connection.request_mut() {
            request.requests += 1;
            tracing::info!(
                %connection_id,
                status = %response.status,
                %target,
                requests = request.requests,
                elapsed = ?request.accepted_at.elapsed(),
                "request served"
            );
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "httpsserver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_SETTINGS.to_string());
    let settings = ServerSettings::load(&path)?;
    tracing::info!(
        settings = %path,
        bind_address = %settings.bind_address,
        certificates = settings.certificates.len(),
        "settings loaded"
    );

    let listen_point = TlsListenPoint::bind(settings.bind_address.as_str(), settings.options()?, DemoFactory).await?;
    tracing::info!(address = %listen_point.local_addr(), "listening for connections");

    let server = serve(listen_point, Arc::new(StaticPage));
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.close();
    server.wait().await;
    Ok(())
}
