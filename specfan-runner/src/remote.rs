// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-process access to the aggregator.
//!
//! The coordinator publishes its [`Aggregator`] on an ephemeral loopback port with
//! [`AggregatorServer`]. Workers connect with a [`RemoteHandle`], which can only add results:
//! the report is rendered by the coordinator alone.
//!
//! The protocol is line-delimited JSON: a worker writes one [`AggregatorRequest`] per line and
//! reads back exactly one [`AggregatorResponse`] line.

use crate::{aggregator::Aggregator, errors::DeliveryError, worker::ResultSink};
use specfan_metadata::{AggregatorRequest, AggregatorResponse, SpecResult};
use std::{
    io::{self, BufRead, Write},
    net::{Ipv4Addr, SocketAddr, TcpStream as StdTcpStream},
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, trace, warn};

/// Serves an [`Aggregator`] to worker processes.
#[derive(Debug)]
pub struct AggregatorServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl AggregatorServer {
    /// Binds an ephemeral loopback port and starts serving `aggregator` on it.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn bind(aggregator: Arc<Aggregator>) -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        debug!(%addr, "aggregator listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(serve(listener, aggregator, shutdown_rx));
        Ok(Self {
            addr,
            shutdown_tx,
            task,
        })
    }

    /// Returns the address workers should deliver to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting connections, then waits for open connections to finish.
    pub async fn shutdown(self) {
        // An error means the server task already exited.
        _ = self.shutdown_tx.send(());
        if let Err(err) = self.task.await {
            warn!("aggregator server task failed: {err}");
        }
        debug!(addr = %self.addr, "aggregator shut down");
    }
}

async fn serve(
    listener: TcpListener,
    aggregator: Arc<Aggregator>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    trace!(%peer, "accepted worker connection");
                    let aggregator = aggregator.clone();
                    connections.spawn(async move {
                        if let Err(err) = handle_connection(stream, aggregator).await {
                            debug!(%peer, "worker connection failed: {err}");
                        }
                    });
                }
                Err(err) => {
                    warn!("failed to accept worker connection: {err}");
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
}

async fn handle_connection(stream: TcpStream, aggregator: Arc<Aggregator>) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }

        let response = match AggregatorRequest::from_line(&line) {
            Ok(AggregatorRequest::Add {
                delivery_id,
                result,
            }) => {
                // Folding takes the aggregator's mutex and echoes to stdout, so it runs off the
                // runtime's worker threads.
                let aggregator = aggregator.clone();
                match tokio::task::spawn_blocking(move || {
                    aggregator.add_delivery(delivery_id, result)
                })
                .await
                {
                    Ok(_) => AggregatorResponse::Accepted,
                    Err(err) => {
                        warn!(delivery_id, "folding a delivered result failed: {err}");
                        AggregatorResponse::Rejected {
                            message: format!("failed to fold result: {err}"),
                        }
                    }
                }
            }
            Ok(other) => AggregatorResponse::Rejected {
                message: format!("unsupported request: {other:?}"),
            },
            Err(err) => AggregatorResponse::Rejected {
                message: err.to_string(),
            },
        };

        write.write_all(response.to_line()?.as_bytes()).await?;
    }
}

/// A worker-side handle to the aggregator published by the coordinator.
///
/// Each delivery uses a fresh connection, so a handle stays usable after the aggregator restarts
/// listening or a connection is dropped.
#[derive(Clone, Debug)]
pub struct RemoteHandle {
    addr: SocketAddr,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl RemoteHandle {
    /// The default time allowed to connect to the aggregator.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// The default time allowed for each read from or write to the aggregator.
    pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

    /// Creates a new handle to the aggregator at `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Self::DEFAULT_IO_TIMEOUT,
        }
    }

    /// Sets the connect and I/O timeouts.
    pub fn with_timeouts(mut self, connect_timeout: Duration, io_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.io_timeout = io_timeout;
        self
    }

    /// Returns the aggregator's address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn io_err(&self) -> impl Fn(io::Error) -> DeliveryError + '_ {
        |err| DeliveryError::Io {
            addr: self.addr,
            err,
        }
    }
}

impl ResultSink for RemoteHandle {
    fn deliver(&self, delivery_id: u64, result: &SpecResult) -> Result<(), DeliveryError> {
        let request = AggregatorRequest::Add {
            delivery_id,
            result: result.clone(),
        };
        let line = request
            .to_line()
            .map_err(|err| DeliveryError::Protocol { err })?;

        let stream = StdTcpStream::connect_timeout(&self.addr, self.connect_timeout).map_err(
            |err| DeliveryError::Connect {
                addr: self.addr,
                err,
            },
        )?;
        stream
            .set_read_timeout(Some(self.io_timeout))
            .map_err(self.io_err())?;
        stream
            .set_write_timeout(Some(self.io_timeout))
            .map_err(self.io_err())?;

        (&stream)
            .write_all(line.as_bytes())
            .map_err(self.io_err())?;

        let mut response = String::new();
        let read = io::BufReader::new(&stream)
            .read_line(&mut response)
            .map_err(self.io_err())?;
        if read == 0 {
            return Err(DeliveryError::ConnectionClosed { addr: self.addr });
        }

        match AggregatorResponse::from_line(&response)
            .map_err(|err| DeliveryError::Protocol { err })?
        {
            AggregatorResponse::Accepted => Ok(()),
            AggregatorResponse::Rejected { message } => Err(DeliveryError::Rejected { message }),
        }
    }
}
