use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use h3mux::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "h3muxd")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a canned request through the full multiplexer pipeline
    Demo {
        #[arg(short, long, default_value = "/")]
        path: String,

        #[arg(short, long)]
        body: Option<String>,
    },

    /// Validate a configuration file
    CheckConfig,
}

/// In-memory framing adapter: raw events are already framing events and
/// every send is logged instead of hitting a wire.
struct LoopbackTransport {
    frames: Vec<String>,
}

impl LoopbackTransport {
    fn new() -> Self {
        Self { frames: Vec::new() }
    }
}

#[async_trait]
impl H3Transport for LoopbackTransport {
    type Event = H3Event;

    fn handle_event(&mut self, event: H3Event) -> h3mux::Result<Vec<H3Event>> {
        Ok(vec![event])
    }

    fn send_headers(
        &mut self,
        stream_id: StreamId,
        headers: &[Header],
        end_stream: bool,
    ) -> h3mux::Result<()> {
        let rendered: Vec<String> = headers
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}: {}",
                    String::from_utf8_lossy(name),
                    String::from_utf8_lossy(value)
                )
            })
            .collect();
        info!(
            "HEADERS stream={} end={} [{}]",
            stream_id,
            end_stream,
            rendered.join(", ")
        );
        self.frames
            .push(format!("HEADERS({}, end={})", stream_id, end_stream));
        Ok(())
    }

    fn send_data(&mut self, stream_id: StreamId, data: Bytes, end_stream: bool) -> h3mux::Result<()> {
        info!(
            "DATA stream={} end={} {} bytes",
            stream_id,
            end_stream,
            data.len()
        );
        self.frames
            .push(format!("DATA({}, {} bytes, end={})", stream_id, data.len(), end_stream));
        Ok(())
    }

    async fn flush(&mut self) -> h3mux::Result<()> {
        debug!("flush");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    let config = match &cli.config {
        Some(path) => MuxConfig::load_from_file(path)?,
        None => MuxConfig::load_from_env()?,
    };

    match cli.command {
        Commands::Demo { path, body } => {
            run_demo(config, path, body).await?;
        }
        Commands::CheckConfig => {
            config.validate()?;
            info!("Configuration OK");
        }
    }

    Ok(())
}

/// Push one request through the multiplexer against a demo application
/// and log every frame the transport would put on the wire.
async fn run_demo(mut config: MuxConfig, path: String, body: Option<String>) -> Result<()> {
    if config.server_name.is_none() {
        config.server_name = Some(format!("h3muxd/{}", env!("CARGO_PKG_VERSION")));
    }

    let spawner = FnSpawner(demo_app);
    let mut mux = Http3Multiplexer::new(
        Arc::new(config),
        LoopbackTransport::new(),
        Arc::new(spawner),
    );

    let stream_id = StreamId::new(0);
    let method: &[u8] = if body.is_some() { b"POST" } else { b"GET" };
    let headers = vec![
        (Bytes::from_static(b":method"), Bytes::copy_from_slice(method)),
        (Bytes::from_static(b":path"), Bytes::from(path)),
        (Bytes::from_static(b":scheme"), Bytes::from_static(b"https")),
        (Bytes::from_static(b":authority"), Bytes::from_static(b"localhost")),
    ];

    mux.handle_transport_event(H3Event::RequestReceived {
        stream_id,
        headers,
        stream_ended: body.is_none(),
    })
    .await?;

    if let Some(body) = body {
        mux.handle_transport_event(H3Event::DataReceived {
            stream_id,
            data: Bytes::from(body),
            stream_ended: true,
        })
        .await?;
    }

    // Drain the application's response events onto the (logged) wire.
    while let Some(event) = mux.next_outbound().await {
        let closed = matches!(event, StreamEvent::StreamClosed { .. });
        mux.send_stream_event(event).await?;
        if closed {
            break;
        }
    }

    info!("Demo complete, {} active streams", mux.active_streams());
    for frame in &mux.transport().frames {
        info!("wire: {}", frame);
    }
    Ok(())
}

/// Demo application: echoes the request line and body size as JSON.
async fn demo_app(scope: Scope, mut receiver: AppReceiver, sender: AppSender) {
    let stream_id = scope.stream_id;
    let mut body_bytes = 0usize;

    while let Some(event) = receiver.recv().await {
        match event {
            StreamEvent::Body { data, .. } => body_bytes += data.len(),
            StreamEvent::EndBody { .. } => break,
            _ => {}
        }
    }

    let payload = serde_json::json!({
        "method": scope.method,
        "path": String::from_utf8_lossy(&scope.raw_path),
        "http_version": scope.http_version,
        "body_bytes": body_bytes,
    });
    let body = Bytes::from(payload.to_string());

    let _ = sender.send(StreamEvent::Response {
        stream_id,
        status_code: 200,
        headers: vec![(
            Bytes::from_static(b"content-type"),
            Bytes::from_static(b"application/json"),
        )],
    });
    let _ = sender.send(StreamEvent::Body {
        stream_id,
        data: body,
    });
    let _ = sender.send(StreamEvent::EndBody { stream_id });
    let _ = sender.send(StreamEvent::StreamClosed { stream_id });
}
