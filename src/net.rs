//! Transport seam between two peers.
//!
//! A [`Link`] sends complete frames and hands back received frames one at a
//! time without blocking. [`TcpLink`] runs a reader thread that forwards raw
//! socket bytes over a channel; [`loopback_pair`] wires two in-process links
//! together for tests and local play.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::error::NetError;
use crate::protocol::frame::{Frame, FrameDecoder};

const READ_CHUNK: usize = 4096;

/// A framed, ordered, bidirectional byte channel to the opponent.
pub trait Link {
    /// Queues an encoded frame for the peer.
    fn send(&mut self, bytes: &[u8]) -> Result<(), NetError>;

    /// Returns the next complete frame, `None` if nothing has arrived yet.
    ///
    /// Frames already received are handed out before a disconnect is
    /// reported.
    fn poll(&mut self) -> Result<Option<Frame>, NetError>;
}

enum Chunk {
    Data(Vec<u8>),
    Failed(io::Error),
}

/// Receiving half shared by both link kinds.
struct Inbox {
    rx: Receiver<Chunk>,
    decoder: FrameDecoder,
}

impl Inbox {
    fn new(rx: Receiver<Chunk>) -> Self {
        Self {
            rx,
            decoder: FrameDecoder::new(),
        }
    }

    fn poll(&mut self) -> Result<Option<Frame>, NetError> {
        if let Some(frame) = self.decoder.next_frame()? {
            return Ok(Some(frame));
        }
        loop {
            match self.rx.try_recv() {
                Ok(Chunk::Data(bytes)) => self.decoder.extend(&bytes),
                Ok(Chunk::Failed(err)) => return Err(NetError::Io(err)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return match self.decoder.next_frame()? {
                        Some(frame) => Ok(Some(frame)),
                        None => Err(NetError::Disconnected),
                    };
                }
            }
        }
        Ok(self.decoder.next_frame()?)
    }
}

/// A direct TCP connection to the opponent.
pub struct TcpLink {
    stream: TcpStream,
    peer: SocketAddr,
    inbox: Inbox,
}

impl TcpLink {
    /// Waits for the opponent to connect on `port`.
    pub fn host(port: u16) -> Result<TcpLink, NetError> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        info!(port, "waiting for opponent");
        Self::accept(&listener)
    }

    /// Accepts a single connection from an already bound listener.
    pub fn accept(listener: &TcpListener) -> Result<TcpLink, NetError> {
        let (stream, _) = listener.accept()?;
        Self::from_stream(stream)
    }

    pub fn connect(addr: impl ToSocketAddrs) -> Result<TcpLink, NetError> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream)
    }

    fn from_stream(stream: TcpStream) -> Result<TcpLink, NetError> {
        if let Err(err) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: {err}");
        }
        let peer = stream.peer_addr()?;
        let reader = stream.try_clone()?;
        let (tx, rx) = unbounded();
        thread::spawn(move || read_loop(reader, tx));
        info!(%peer, "connected");
        Ok(TcpLink {
            stream,
            peer,
            inbox: Inbox::new(rx),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Link for TcpLink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        self.stream.write_all(bytes).map_err(|err| match err.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => NetError::Disconnected,
            _ => NetError::Io(err),
        })
    }

    fn poll(&mut self) -> Result<Option<Frame>, NetError> {
        self.inbox.poll()
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        // unblocks the reader thread
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

fn read_loop(mut stream: TcpStream, tx: Sender<Chunk>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                debug!("peer closed the connection");
                return;
            }
            Ok(n) => {
                if tx.send(Chunk::Data(buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                match err.kind() {
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                        debug!("connection reset: {err}");
                    }
                    _ => {
                        warn!("read failed: {err}");
                        let _ = tx.send(Chunk::Failed(err));
                    }
                }
                return;
            }
        }
    }
}

/// One end of an in-process link.
pub struct LoopLink {
    tx: Sender<Chunk>,
    inbox: Inbox,
}

/// Two links connected to each other.
pub fn loopback_pair() -> (LoopLink, LoopLink) {
    let (a_tx, a_rx) = unbounded();
    let (b_tx, b_rx) = unbounded();
    (
        LoopLink {
            tx: a_tx,
            inbox: Inbox::new(b_rx),
        },
        LoopLink {
            tx: b_tx,
            inbox: Inbox::new(a_rx),
        },
    )
}

impl Link for LoopLink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        self.tx
            .send(Chunk::Data(bytes.to_vec()))
            .map_err(|_| NetError::Disconnected)
    }

    fn poll(&mut self) -> Result<Option<Frame>, NetError> {
        self.inbox.poll()
    }
}
