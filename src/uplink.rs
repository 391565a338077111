//! The uplink transport.
//!
//! One TCP connection to the uplink, line-framed. The read loop drives the
//! whole daemon: each inbound line is processed to completion before the
//! next is read, so no two dispatches ever overlap. Writes go through an
//! unbounded queue so nothing on the processing path blocks.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{info, warn};

use crate::dispatch;
use crate::state::Construct;

/// Outbound line sink toward the uplink.
///
/// Must never block the processing loop.
pub trait UplinkSink: Send + Sync {
    /// Queue one line for delivery.
    fn send_line(&self, line: &str);
}

/// Sink backed by the connection's writer task.
pub struct QueueSink {
    tx: mpsc::UnboundedSender<String>,
}

impl QueueSink {
    /// Wrap the writer queue.
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl UplinkSink for QueueSink {
    fn send_line(&self, line: &str) {
        if self.tx.send(line.to_string()).is_err() {
            warn!(line = %line, "dropping outbound line, writer is gone");
        }
    }
}

/// Connect to the configured uplink, handshake, then run inbound lines to
/// completion one at a time until the link drops.
pub async fn run(
    core: Arc<Construct>,
    mut rx: mpsc::UnboundedReceiver<String>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", core.config.uplink.host, core.config.uplink.port);
    info!(addr = %addr, "connecting to uplink");
    let stream = TcpStream::connect(&addr).await?;
    let (read_half, write_half) = stream.into_split();
    let mut lines_in = FramedRead::new(read_half, LinesCodec::new());
    let mut lines_out = FramedWrite::new(write_half, LinesCodec::new());

    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = lines_out.send(line).await {
                warn!(error = %e, "uplink write failed");
                break;
            }
        }
    });

    send_handshake(&core);

    while let Some(line) = lines_in.next().await {
        match line {
            Ok(line) => dispatch::process(&core, &line).await,
            Err(e) => {
                warn!(error = %e, "uplink read failed");
                break;
            }
        }
    }

    info!("uplink closed");
    handle_uplink_closed(&core);
    Ok(())
}

fn send_handshake(core: &Arc<Construct>) {
    let config = &core.config;
    core.uplink.send_line(&format!(
        "PASS {} TS 6 :{}",
        config.uplink.password, config.server.numeric
    ));
    core.uplink.send_line("CAPAB :NOQUIT UNCONNECT EOB");
    core.uplink.send_line(&format!(
        "SERVER {} 0 :{}",
        config.server.name, config.server.description
    ));
}

/// A dropped link is an immediate synchronous deletion of everything that
/// was behind it.
fn handle_uplink_closed(core: &Arc<Construct>) {
    let direct: Vec<String> = {
        let servers = core.servers.read();
        servers
            .get(servers.root_name())
            .map(|root| root.links.clone())
            .unwrap_or_default()
    };
    for name in direct {
        core.delete_server(&name, "uplink closed");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::UplinkSink;

    /// Collects outbound lines for inspection.
    #[derive(Default)]
    pub struct MemorySink {
        lines: Mutex<Vec<String>>,
    }

    impl MemorySink {
        /// Snapshot of everything sent so far.
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().clone()
        }

        /// Forget everything sent so far.
        pub fn clear(&self) {
            self.lines.lock().clear();
        }
    }

    impl UplinkSink for MemorySink {
        fn send_line(&self, line: &str) {
            self.lines.lock().push(line.to_string());
        }
    }
}
