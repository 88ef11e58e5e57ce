//! TCP listeners for the gateway and login ports.
//!
//! Each accepted socket runs on its own task that reads length-prefixed
//! frames strictly in arrival order and hands them to a [`CommandRegistry`].
//! The two listener flavors share the envelope but differ in a few rules:
//!
//! - gateway: a deadline for the first frame, optional idle timeout, a
//!   connection cap, and a frame that fails to decode closes the socket
//! - login: no deadlines, answers the Flash policy request, and skips a frame
//!   that fails to decode

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use seer_shared::protocol::{self, Packet, PacketError, HEADER_LEN};

use super::connection::Connection;
use super::policy::{POLICY_REQUEST, POLICY_RESPONSE};
use super::registry::{CommandRegistry, Context};
use crate::config::GatewayConfig;

/// Longest text request accepted before the binary stream starts
const MAX_TEXT_REQUEST: u64 = 256;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

/// Which protocol variant a listener speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Gateway,
    Login,
}

impl Flavor {
    pub fn name(self) -> &'static str {
        match self {
            Flavor::Gateway => "gateway",
            Flavor::Login => "login",
        }
    }

    /// Whether a frame that fails to decode ends the connection
    pub fn closes_on_bad_frame(self) -> bool {
        matches!(self, Flavor::Gateway)
    }

    /// Whether the first bytes may be a Flash policy request
    pub fn answers_policy(self) -> bool {
        matches!(self, Flavor::Login)
    }
}

#[derive(Debug, Clone)]
pub struct ListenerOptions {
    pub flavor: Flavor,
    /// 0 means unlimited
    pub max_connections: usize,
    pub read_buffer_bytes: usize,
    pub handshake_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

impl ListenerOptions {
    pub fn gateway(config: &GatewayConfig) -> Self {
        Self {
            flavor: Flavor::Gateway,
            max_connections: config.max_connections,
            read_buffer_bytes: config.read_buffer_bytes,
            handshake_timeout: config.handshake_timeout(),
            idle_timeout: config.idle_timeout(),
        }
    }

    pub fn login() -> Self {
        Self {
            flavor: Flavor::Login,
            max_connections: 0,
            read_buffer_bytes: 8 * 1024,
            handshake_timeout: None,
            idle_timeout: None,
        }
    }
}

/// Called once when a connection's read loop ends
pub type CloseHook = Arc<dyn Fn(&Connection) + Send + Sync>;

pub struct ConnectionServer {
    registry: Arc<CommandRegistry>,
    options: ListenerOptions,
    active: Arc<AtomicUsize>,
    on_close: Option<CloseHook>,
}

/// Releases a connection slot when the task owning it ends
struct SlotGuard(Arc<AtomicUsize>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConnectionServer {
    pub fn new(registry: Arc<CommandRegistry>, options: ListenerOptions) -> Self {
        Self {
            registry,
            options,
            active: Arc::new(AtomicUsize::new(0)),
            on_close: None,
        }
    }

    pub fn with_close_hook(mut self, hook: CloseHook) -> Self {
        self.on_close = Some(hook);
        self
    }

    pub fn flavor(&self) -> Flavor {
        self.options.flavor
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Bind a listening socket, naming the address on failure
    pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
        TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
    }

    /// Accept until `shutdown` flips.
    ///
    /// Open connections are left to drain on their own.
    pub async fn run(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        let name = self.options.flavor.name();
        if let Ok(addr) = listener.local_addr() {
            info!("{} server listening on {}", name, addr);
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.accept(stream, peer),
                    Err(e) => warn!("{} accept error: {}", name, e),
                },
                _ = shutdown.changed() => break,
            }
        }

        info!("{} server stopped accepting", name);
    }

    fn accept(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let max = self.options.max_connections;
        let current = self.active.fetch_add(1, Ordering::SeqCst);
        let slot = SlotGuard(self.active.clone());
        if max > 0 && current >= max {
            warn!("Connection limit {} reached, refusing {}", max, peer);
            return;
        }

        let _ = stream.set_nodelay(true);
        let server = Arc::clone(self);
        tokio::spawn(async move {
            let _slot = slot;
            server.serve(stream, Some(peer)).await;
        });
    }

    /// Drive one connection until it closes
    pub async fn serve<S>(&self, stream: S, peer: Option<SocketAddr>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let connection = Connection::new(write_half, peer);
        debug!("{} opened on {} listener", connection, self.options.flavor.name());

        let capacity = self.options.read_buffer_bytes.max(HEADER_LEN);
        let mut reader = BufReader::with_capacity(capacity, read_half);
        match self.read_loop(&mut reader, &connection).await {
            Ok(()) => debug!("{} closed", connection),
            Err(ServerError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("{} closed by peer", connection)
            }
            Err(e) => warn!("{} closed: {}", connection, e),
        }

        if let Some(hook) = &self.on_close {
            hook(&connection);
        }
        connection.close().await;
    }

    async fn read_loop<R>(&self, reader: &mut BufReader<R>, connection: &Connection) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
    {
        if self.options.flavor.answers_policy() && answer_policy(reader, connection).await? {
            return Ok(());
        }

        let mut deadline = self.options.handshake_timeout;
        let mut waiting_for = "handshake";
        loop {
            let frame = with_deadline(deadline, waiting_for, read_frame(reader)).await?;
            deadline = self.options.idle_timeout;
            waiting_for = "next frame";

            let packet = match Packet::decode(&frame) {
                Ok(packet) => packet,
                Err(e) if !self.options.flavor.closes_on_bad_frame() => {
                    warn!("{} sent a bad frame: {}", connection, e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let command_id = packet.command_id;
            let ctx = Context {
                command_id,
                user_id: packet.user_id,
                seq: packet.seq,
                body: packet.body,
                connection: connection.clone(),
            };
            if !self.registry.dispatch(ctx).await {
                debug!("{} command {} has no handler", connection, command_id);
            }
        }
    }
}

/// Answer a policy request if the stream starts with one.
///
/// Returns true when the first bytes were text; the connection is done then.
async fn answer_policy<R>(reader: &mut BufReader<R>, connection: &Connection) -> Result<bool, ServerError>
where
    R: AsyncRead + Unpin,
{
    let is_text = reader.fill_buf().await?.first() == Some(&b'<');
    if !is_text {
        return Ok(false);
    }

    let mut request = Vec::with_capacity(POLICY_REQUEST.len());
    (&mut *reader).take(MAX_TEXT_REQUEST).read_until(0, &mut request).await?;
    if request == POLICY_REQUEST {
        debug!("{} asked for the policy file", connection);
        connection.send_quiet(POLICY_RESPONSE).await;
    } else {
        debug!("{} sent an unknown text request", connection);
    }
    Ok(true)
}

/// Read one length-prefixed frame, header included.
async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = protocol::validate_length(u32::from_be_bytes(len_buf))?;

    let mut frame = vec![0u8; len];
    frame[..4].copy_from_slice(&len_buf);
    reader.read_exact(&mut frame[4..]).await?;
    Ok(frame)
}

async fn with_deadline<T>(
    limit: Option<Duration>,
    waiting_for: &'static str,
    fut: impl Future<Output = Result<T, ServerError>>,
) -> Result<T, ServerError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ServerError::Timeout(waiting_for))?,
        None => fut.await,
    }
}

/// Send a success frame (result 0). Write errors are swallowed.
pub async fn send_response(connection: &Connection, command_id: i32, user_id: u32, body: &[u8]) {
    send_response_with_result(connection, command_id, user_id, 0, body).await;
}

/// Send a frame with an explicit result code, as the login flavor does
pub async fn send_response_with_result(
    connection: &Connection,
    command_id: i32,
    user_id: u32,
    result: i32,
    body: &[u8],
) {
    let frame = protocol::encode(command_id, user_id, result, body);
    connection.send_quiet(&frame).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::registry::handler;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    const WAIT: Duration = Duration::from_secs(5);

    async fn start(
        registry: Arc<CommandRegistry>,
        options: ListenerOptions,
    ) -> (SocketAddr, watch::Sender<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        let server = Arc::new(ConnectionServer::new(registry, options));
        tokio::spawn(server.run(listener, rx));
        (addr, tx)
    }

    fn gateway_options() -> ListenerOptions {
        ListenerOptions::gateway(&GatewayConfig::default())
    }

    async fn read_packet(stream: &mut TcpStream) -> Packet {
        let mut len_buf = [0u8; 4];
        tokio::time::timeout(WAIT, stream.read_exact(&mut len_buf))
            .await
            .unwrap()
            .unwrap();
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut frame = vec![0u8; len];
        frame[..4].copy_from_slice(&len_buf);
        stream.read_exact(&mut frame[4..]).await.unwrap();
        Packet::decode(&frame).unwrap()
    }

    async fn expect_closed(stream: &mut TcpStream) {
        let mut buf = [0u8; 32];
        let read = tokio::time::timeout(WAIT, stream.read(&mut buf)).await.unwrap();
        assert!(matches!(read, Ok(0) | Err(_)), "connection still open: {:?}", read);
    }

    #[tokio::test]
    async fn test_frame_is_dispatched_and_answered() {
        let registry = Arc::new(CommandRegistry::new());
        registry.register(
            2001,
            handler(|ctx| async move {
                ctx.reply(&ctx.body).await;
            }),
        );
        let (addr, _shutdown) = start(registry, gateway_options()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&protocol::encode(2001, 1001, 5, b"ping")).await.unwrap();

        let reply = read_packet(&mut client).await;
        assert_eq!(reply.command_id, 2001);
        assert_eq!(reply.user_id, 1001);
        assert_eq!(reply.seq, 0);
        assert_eq!(&reply.body[..], b"ping");
    }

    #[tokio::test]
    async fn test_frames_are_handled_in_arrival_order() {
        let registry = Arc::new(CommandRegistry::new());
        registry.register(
            2101,
            handler(|ctx| async move {
                ctx.reply(&ctx.seq.to_be_bytes()).await;
            }),
        );
        let (addr, _shutdown) = start(registry, gateway_options()).await;

        let mut batch = Vec::new();
        for seq in 1..=3 {
            batch.extend_from_slice(&protocol::encode(2101, 7, seq, &[]));
        }
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&batch).await.unwrap();

        for seq in 1..=3i32 {
            let reply = read_packet(&mut client).await;
            assert_eq!(&reply.body[..], &seq.to_be_bytes());
        }
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_without_dispatch() {
        let hits = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(CommandRegistry::new());
        let counter = hits.clone();
        registry.set_default(handler(move |_ctx| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let (addr, _shutdown) = start(registry, gateway_options()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&2_000_000u32.to_be_bytes()).await.unwrap();
        expect_closed(&mut client).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_undersized_length_closes() {
        let (addr, _shutdown) = start(Arc::new(CommandRegistry::new()), gateway_options()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&16u32.to_be_bytes()).await.unwrap();
        expect_closed(&mut client).await;
    }

    #[tokio::test]
    async fn test_silent_client_hits_handshake_deadline() {
        let mut options = gateway_options();
        options.handshake_timeout = Some(Duration::from_millis(100));
        let (addr, _shutdown) = start(Arc::new(CommandRegistry::new()), options).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        expect_closed(&mut client).await;
    }

    #[tokio::test]
    async fn test_default_handler_answers_unknown_command() {
        let registry = Arc::new(CommandRegistry::new());
        registry.set_default(handler(|ctx| async move {
            ctx.reply(&[]).await;
        }));
        let (addr, _shutdown) = start(registry, gateway_options()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&protocol::encode(4242, 9, 0, &[])).await.unwrap();
        let reply = read_packet(&mut client).await;
        assert_eq!(reply.command_id, 4242);
        assert_eq!(reply.length as usize, HEADER_LEN);
    }

    #[tokio::test]
    async fn test_login_flavor_answers_policy_request() {
        let (addr, _shutdown) = start(Arc::new(CommandRegistry::new()), ListenerOptions::login()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(POLICY_REQUEST).await.unwrap();
        let mut reply = Vec::new();
        tokio::time::timeout(WAIT, client.read_to_end(&mut reply))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, POLICY_RESPONSE);
    }

    #[tokio::test]
    async fn test_login_flavor_reads_binary_after_sniffing() {
        let registry = Arc::new(CommandRegistry::new());
        registry.register(
            104,
            handler(|ctx| async move {
                send_response_with_result(&ctx.connection, ctx.command_id, ctx.user_id, 3, &[]).await;
            }),
        );
        let (addr, _shutdown) = start(registry, ListenerOptions::login()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&protocol::encode(104, 0, 0, &[0u8; 8])).await.unwrap();
        let reply = read_packet(&mut client).await;
        assert_eq!(reply.command_id, 104);
        assert_eq!(reply.seq, 3);
    }

    #[tokio::test]
    async fn test_connection_cap_refuses_extra_clients() {
        let registry = Arc::new(CommandRegistry::new());
        registry.set_default(handler(|ctx| async move {
            ctx.reply(&[]).await;
        }));
        let mut options = gateway_options();
        options.max_connections = 1;
        let (addr, _shutdown) = start(registry, options).await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(&protocol::encode(1, 1, 0, &[])).await.unwrap();
        read_packet(&mut first).await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        expect_closed(&mut second).await;
    }

    #[tokio::test]
    async fn test_close_hook_sees_connection() {
        let closed = Arc::new(AtomicUsize::new(0));
        let seen = closed.clone();
        let server = ConnectionServer::new(Arc::new(CommandRegistry::new()), gateway_options())
            .with_close_hook(Arc::new(move |conn: &Connection| {
                seen.store(conn.id() as usize, Ordering::SeqCst);
            }));

        let (client, server_side) = tokio::io::duplex(64);
        drop(client);
        server.serve(server_side, None).await;
        assert_ne!(closed.load(Ordering::SeqCst), 0);
    }
}
