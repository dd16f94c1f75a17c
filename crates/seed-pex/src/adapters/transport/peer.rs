//! One established TCP connection.

use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::codec::{read_frame, write_frame};
use super::handshake::NodeInfo;
use super::switch::TcpSwitch;
use crate::domain::{NetworkAddress, NodeId, PexMessage};
use crate::ports::Peer;

/// A handshaken connection.
///
/// Outgoing messages go through a bounded queue drained by a writer task;
/// a reader task hands incoming messages to the switch. Closing lets the
/// writer flush what is already queued.
#[derive(Debug)]
pub struct TcpPeer {
    id: NodeId,
    info: NodeInfo,
    socket_addr: SocketAddr,
    listen_addr: Option<NetworkAddress>,
    outbound: bool,
    connected_at: Instant,
    tx: mpsc::Sender<PexMessage>,
    close: watch::Sender<bool>,
}

/// The halves of a connection, kept aside until the peer is registered.
pub(crate) struct PeerIo {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    rx: mpsc::Receiver<PexMessage>,
    close_rx: watch::Receiver<bool>,
}

impl TcpPeer {
    pub(crate) fn new(
        stream: TcpStream,
        socket_addr: SocketAddr,
        id: NodeId,
        info: NodeInfo,
        outbound: bool,
        send_queue_capacity: usize,
    ) -> (Arc<Self>, PeerIo) {
        let (tx, rx) = mpsc::channel(send_queue_capacity.max(1));
        let (close, close_rx) = watch::channel(false);
        let (reader, writer) = stream.into_split();
        let listen_addr = info.listen_address(socket_addr);
        let peer = Arc::new(Self {
            id,
            info,
            socket_addr,
            listen_addr,
            outbound,
            connected_at: Instant::now(),
            tx,
            close,
        });
        let io = PeerIo {
            reader,
            writer,
            rx,
            close_rx,
        };
        (peer, io)
    }

    /// The remote's handshake info.
    pub fn node_info(&self) -> &NodeInfo {
        &self.info
    }

    /// Ask both tasks to finish. Queued messages are still written.
    pub fn close(&self) {
        self.close.send_replace(true);
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        *self.close.borrow()
    }
}

impl PeerIo {
    pub(crate) fn spawn(self, peer: Arc<TcpPeer>, switch: Weak<TcpSwitch>, max_frame_size: usize) {
        tokio::spawn(write_loop(
            self.writer,
            self.rx,
            self.close_rx.clone(),
            Arc::clone(&peer),
            max_frame_size,
        ));
        tokio::spawn(read_loop(
            self.reader,
            self.close_rx,
            peer,
            switch,
            max_frame_size,
        ));
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<PexMessage>,
    mut close_rx: watch::Receiver<bool>,
    peer: Arc<TcpPeer>,
    max_frame_size: usize,
) {
    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Some(msg) => {
                    if let Err(e) = write_frame(&mut writer, &msg, max_frame_size).await {
                        debug!(peer = %peer.id, error = %e, "Write failed");
                        peer.close();
                        break;
                    }
                }
                None => break,
            },
            _ = close_rx.changed() => {
                while let Ok(msg) = rx.try_recv() {
                    if write_frame(&mut writer, &msg, max_frame_size).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    mut close_rx: watch::Receiver<bool>,
    peer: Arc<TcpPeer>,
    switch: Weak<TcpSwitch>,
    max_frame_size: usize,
) {
    let reason = loop {
        tokio::select! {
            _ = close_rx.changed() => break "closed".to_string(),
            frame = read_frame::<_, PexMessage>(&mut reader, max_frame_size) => match frame {
                Ok(message) => {
                    let Some(switch) = switch.upgrade() else {
                        break "switch dropped".to_string();
                    };
                    switch.deliver(&peer, message);
                }
                Err(e) if e.is_eof() => break "connection closed by remote".to_string(),
                Err(e) => break format!("read failed: {e}"),
            },
        }
    };

    peer.close();
    if let Some(switch) = switch.upgrade() {
        switch.peer_closed(&peer, &reason);
    }
}

impl Peer for TcpPeer {
    fn id(&self) -> NodeId {
        self.id
    }

    fn socket_addr(&self) -> Option<SocketAddr> {
        Some(self.socket_addr)
    }

    fn listen_addr(&self) -> Option<NetworkAddress> {
        self.listen_addr
    }

    fn is_outbound(&self) -> bool {
        self.outbound
    }

    fn send(&self, message: PexMessage) -> bool {
        self.tx.try_send(message).is_ok()
    }

    fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
