//! TCP Transport Adapter
//!
//! Implements [`FilterTransport`] over one TCP connection using the framed
//! protocol in [`crate::protocol`].
//!
//! Many calls can be in flight on the connection at once:
//!
//! 1. The caller registers its request id in [`PendingReplies`]
//! 2. The frame is written under the write-half lock, held only for the write
//! 3. The caller waits on its own reply channel. Whichever waiting caller
//!    holds the read-half lock reads frames and hands each reply to the
//!    caller registered under its id
//!
//! Replies nobody waits for (the call hit its deadline or was cancelled) are
//! discarded. A call abandoned halfway through writing its frame leaves the
//! stream unusable; every later call reports a connection error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::ports::FilterTransport;
use crate::protocol::{
    decode_frame, encode_frame, FilterRequest, KeyRequest, Request, RequestFrame, Response,
    ResponseFrame,
};

/// Initial read buffer capacity
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Framed TCP connection to a filter service
pub struct TcpTransport {
    /// Remote address, for logs
    peer: String,
    next_id: AtomicU64,
    writer: Mutex<Writer>,
    reader: Mutex<Reader>,
    pending: PendingReplies,
    /// Fired by `close`; aborts in-flight calls
    closed: CancellationToken,
}

struct Writer {
    half: Option<OwnedWriteHalf>,
    /// Set while a frame is partially written
    in_progress: bool,
}

struct Reader {
    half: Option<OwnedReadHalf>,
    buf: BytesMut,
}

/// Callers waiting for a reply, keyed by request id
#[derive(Default)]
struct PendingReplies {
    state: parking_lot::Mutex<PendingState>,
}

#[derive(Default)]
struct PendingState {
    waiting: HashMap<u64, oneshot::Sender<Response>>,
    /// Sticky; no call is accepted once set
    failure: Option<String>,
}

impl PendingReplies {
    fn register(&self, id: u64) -> Result<oneshot::Receiver<Response>, TransportError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.failure {
            return Err(TransportError::Connection(reason.clone()));
        }

        let (tx, rx) = oneshot::channel();
        state.waiting.insert(id, tx);
        Ok(rx)
    }

    fn forget(&self, id: u64) {
        self.state.lock().waiting.remove(&id);
    }

    /// Hand a reply to its caller. Returns false if nobody is waiting for it.
    fn complete(&self, frame: ResponseFrame) -> bool {
        let sender = self.state.lock().waiting.remove(&frame.id);
        match sender {
            Some(tx) => tx.send(frame.response).is_ok(),
            None => false,
        }
    }

    /// Mark the connection failed and release every waiting caller
    fn fail(&self, reason: String) -> TransportError {
        let mut state = self.state.lock();
        let reason = state.failure.get_or_insert(reason).clone();
        state.waiting.clear();
        TransportError::Connection(reason)
    }

    fn failure(&self) -> TransportError {
        let reason = self.state.lock().failure.clone();
        TransportError::Connection(reason.unwrap_or_else(|| "connection lost".to_string()))
    }
}

/// Drops the caller's registration when its call ends, however it ends
struct Registration<'a> {
    pending: &'a PendingReplies,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.pending.forget(self.id);
    }
}

impl TcpTransport {
    /// Dial the endpoint
    ///
    /// Not bounded here; callers wrap this in their own deadline. Dropping
    /// the returned future abandons the attempt.
    pub async fn connect(endpoint: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(endpoint)
            .await
            .map_err(|e| TransportError::Connection(format!("{}: {}", endpoint, e)))?;
        stream.set_nodelay(true)?;

        debug!(endpoint = endpoint, "TCP connection established");
        Ok(Self::from_stream(endpoint, stream))
    }

    /// Wrap an already connected stream
    pub fn from_stream(peer: impl Into<String>, stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            peer: peer.into(),
            next_id: AtomicU64::new(1),
            writer: Mutex::new(Writer {
                half: Some(write_half),
                in_progress: false,
            }),
            reader: Mutex::new(Reader {
                half: Some(read_half),
                buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            }),
            pending: PendingReplies::default(),
            closed: CancellationToken::new(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    async fn call(&self, request: Request) -> Result<Response, TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            result = self.exchange(request) => result,
        }
    }

    async fn exchange(&self, request: Request) -> Result<Response, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = request.method();
        let frame = encode_frame(&RequestFrame { id, request })?;

        let reply = self.pending.register(id)?;
        let _registration = Registration {
            pending: &self.pending,
            id,
        };

        trace!(peer = %self.peer, id = id, method = method, bytes = frame.len(), "Sending request");
        self.send(&frame).await?;
        self.receive(reply).await
    }

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = &mut *guard;

        if writer.in_progress {
            return Err(self.broken("stream left mid-frame by an abandoned call".to_string()));
        }
        let half = writer.half.as_mut().ok_or(TransportError::Closed)?;

        writer.in_progress = true;
        match half.write_all(frame).await {
            Ok(()) => {
                writer.in_progress = false;
                Ok(())
            }
            Err(e) => Err(self.broken(e.to_string())),
        }
    }

    /// Wait for the reply registered as `reply`, reading the socket on
    /// behalf of every waiting caller while holding the read half
    async fn receive(
        &self,
        mut reply: oneshot::Receiver<Response>,
    ) -> Result<Response, TransportError> {
        let mut guard = tokio::select! {
            biased;
            delivered = &mut reply => return delivered.map_err(|_| self.pending.failure()),
            guard = self.reader.lock() => guard,
        };
        let reader = &mut *guard;

        loop {
            // Another caller may have delivered ours while we waited for the lock
            match reply.try_recv() {
                Ok(response) => return Ok(response),
                Err(TryRecvError::Closed) => return Err(self.pending.failure()),
                Err(TryRecvError::Empty) => {}
            }

            let half = reader.half.as_mut().ok_or(TransportError::Closed)?;
            match half.read_buf(&mut reader.buf).await {
                Ok(0) => return Err(self.broken("connection closed by peer".to_string())),
                Ok(_) => {}
                Err(e) => return Err(self.broken(e.to_string())),
            }

            while let Some(frame) = decode_frame::<ResponseFrame>(&mut reader.buf)
                .map_err(|e| self.broken(e.to_string()))?
            {
                let id = frame.id;
                if !self.pending.complete(frame) {
                    trace!(stale_id = id, "Discarding reply to an abandoned call");
                }
            }
        }
    }

    fn broken(&self, reason: String) -> TransportError {
        warn!(peer = %self.peer, reason = %reason, "Connection failed");
        self.pending.fail(reason)
    }
}

fn expect_empty(response: Response) -> Result<(), TransportError> {
    match response {
        Response::Empty => Ok(()),
        Response::Error(e) => Err(TransportError::Remote {
            code: e.code,
            message: e.message,
        }),
        Response::Bools(_) => Err(TransportError::UnexpectedResponse(
            "boolean results for a call without a payload".to_string(),
        )),
    }
}

fn expect_bools(response: Response) -> Result<Vec<bool>, TransportError> {
    match response {
        Response::Bools(b) => Ok(b.results),
        Response::Error(e) => Err(TransportError::Remote {
            code: e.code,
            message: e.message,
        }),
        Response::Empty => Err(TransportError::UnexpectedResponse(
            "empty response where results were expected".to_string(),
        )),
    }
}

#[async_trait]
impl FilterTransport for TcpTransport {
    async fn create_filter(&self, request: FilterRequest) -> Result<(), TransportError> {
        self.call(Request::CreateFilter(request))
            .await
            .and_then(expect_empty)
    }

    async fn add(&self, request: KeyRequest) -> Result<Vec<bool>, TransportError> {
        self.call(Request::Add(request)).await.and_then(expect_bools)
    }

    async fn has(&self, request: KeyRequest) -> Result<Vec<bool>, TransportError> {
        self.call(Request::Has(request)).await.and_then(expect_bools)
    }

    async fn drop_filter(&self, request: FilterRequest) -> Result<(), TransportError> {
        self.call(Request::DropFilter(request))
            .await
            .and_then(expect_empty)
    }

    async fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();

        // In-flight calls observe `closed` and release both halves
        if let Some(mut half) = self.writer.lock().await.half.take() {
            if let Err(e) = half.shutdown().await {
                debug!(peer = %self.peer, error = %e, "Error shutting down TCP stream");
            }
        }
        self.reader.lock().await.half = None;
        debug!(peer = %self.peer, "TCP transport closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{BoolResponse, ErrorResponse};
    use tokio::net::TcpListener;

    async fn read_request(stream: &mut TcpStream, buf: &mut BytesMut) -> Option<RequestFrame> {
        loop {
            if let Some(frame) = decode_frame::<RequestFrame>(buf).unwrap() {
                return Some(frame);
            }
            if stream.read_buf(buf).await.unwrap() == 0 {
                return None;
            }
        }
    }

    async fn write_response(stream: &mut TcpStream, id: u64, response: Response) {
        let frame = encode_frame(&ResponseFrame { id, response }).unwrap();
        stream.write_all(&frame).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = TcpTransport::connect(&addr.to_string()).await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }

    #[tokio::test]
    async fn test_bool_reply_and_remote_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();

            let first = read_request(&mut stream, &mut buf).await.unwrap();
            let Request::Has(req) = first.request else {
                panic!("expected has");
            };
            let results = vec![true; req.hashes.len()];
            write_response(&mut stream, first.id, Response::Bools(BoolResponse { results })).await;

            let second = read_request(&mut stream, &mut buf).await.unwrap();
            write_response(
                &mut stream,
                second.id,
                Response::Error(ErrorResponse {
                    code: 7001,
                    message: "no such filter".to_string(),
                }),
            )
            .await;
        });

        let transport = TcpTransport::connect(&addr.to_string()).await.unwrap();
        let has = transport
            .has(KeyRequest {
                name: "users".to_string(),
                hashes: crate::domain::derive_hash_pairs(&["a", "b"]),
            })
            .await
            .unwrap();
        assert_eq!(has, vec![true, true]);

        let dropped = transport
            .drop_filter(FilterRequest {
                name: "ghost".to_string(),
            })
            .await;
        assert!(matches!(dropped, Err(TransportError::Remote { code: 7001, .. })));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_hangup_is_sticky_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();
            let _ = read_request(&mut stream, &mut buf).await;
            // Hang up without answering
        });

        let transport = TcpTransport::connect(&addr.to_string()).await.unwrap();
        let request = FilterRequest {
            name: "users".to_string(),
        };

        let first = transport.create_filter(request.clone()).await;
        assert!(matches!(first, Err(TransportError::Connection(_))));

        let second = transport.create_filter(request).await;
        assert!(matches!(second, Err(TransportError::Connection(_))));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_fails_later_calls() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

        let transport = TcpTransport::connect(&addr.to_string()).await.unwrap();
        transport.close().await;
        transport.close().await;

        assert!(transport.is_closed());
        let result = transport
            .create_filter(FilterRequest {
                name: "users".to_string(),
            })
            .await;
        assert_eq!(result, Err(TransportError::Closed));

        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_replies_routed_by_id_out_of_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();

            // Both requests must be in flight before either is answered
            let first = read_request(&mut stream, &mut buf).await.unwrap();
            let second = read_request(&mut stream, &mut buf).await.unwrap();

            for frame in [second, first] {
                let Request::Has(req) = frame.request else {
                    panic!("expected has");
                };
                let results = vec![req.name == "one"; req.hashes.len()];
                write_response(&mut stream, frame.id, Response::Bools(BoolResponse { results }))
                    .await;
            }
        });

        let transport = TcpTransport::connect(&addr.to_string()).await.unwrap();
        let request = |name: &str, keys: &[&str]| KeyRequest {
            name: name.to_string(),
            hashes: crate::domain::derive_hash_pairs(keys),
        };

        let both = async {
            tokio::join!(
                transport.has(request("one", &["a"])),
                transport.has(request("three", &["a", "b", "c"])),
            )
        };
        let (one, three) = tokio::time::timeout(std::time::Duration::from_secs(5), both)
            .await
            .expect("calls must not wait on each other");

        assert_eq!(one.unwrap(), vec![true]);
        assert_eq!(three.unwrap(), vec![false, false, false]);

        server.await.unwrap();
    }
}
