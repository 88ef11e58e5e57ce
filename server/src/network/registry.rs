//! Command id → handler table.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::RwLock;

use super::connection::Connection;
use super::server::{send_response, send_response_with_result};

/// Per-request context handed to a handler.
///
/// There is no server handle on the context. Sending goes through [`reply`],
/// [`reply_with_result`] and [`push`] on the request's own connection, and
/// handlers reach world state through the game context they are registered
/// with.
///
/// [`reply`]: Context::reply
/// [`reply_with_result`]: Context::reply_with_result
/// [`push`]: Context::push
#[derive(Debug, Clone)]
pub struct Context {
    pub command_id: i32,
    pub user_id: u32,
    pub seq: i32,
    pub body: Bytes,
    pub connection: Connection,
}

impl Context {
    /// Answer on the same command with result 0
    pub async fn reply(&self, body: &[u8]) {
        send_response(&self.connection, self.command_id, self.user_id, body).await;
    }

    /// Answer on the same command with an explicit result code
    pub async fn reply_with_result(&self, result: i32, body: &[u8]) {
        send_response_with_result(&self.connection, self.command_id, self.user_id, result, body).await;
    }

    /// Push a frame for another command to this client
    pub async fn push(&self, command_id: i32, body: &[u8]) {
        send_response(&self.connection, command_id, self.user_id, body).await;
    }
}

pub type Handler = Arc<dyn Fn(Context) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`Handler`]
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

#[derive(Default)]
struct Table {
    handlers: HashMap<i32, Handler>,
    fallback: Option<Handler>,
}

/// Thread-safe registry shared by every connection of a listener
#[derive(Default)]
pub struct CommandRegistry {
    table: RwLock<Table>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `id`, replacing any previous one
    pub fn register(&self, id: i32, handler: Handler) {
        self.table.write().handlers.insert(id, handler);
    }

    /// Install `handler` only when `id` has none yet. Returns whether it was installed.
    pub fn register_if_absent(&self, id: i32, handler: Handler) -> bool {
        let mut table = self.table.write();
        if table.handlers.contains_key(&id) {
            return false;
        }
        table.handlers.insert(id, handler);
        true
    }

    /// Handler used when no specific one matches
    pub fn set_default(&self, handler: Handler) {
        self.table.write().fallback = Some(handler);
    }

    pub fn contains(&self, id: i32) -> bool {
        self.table.read().handlers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.table.read().handlers.len()
    }

    /// Route `ctx` to its handler.
    ///
    /// The lock is released before the handler runs. Returns false when the
    /// command was dropped for lack of any handler.
    pub async fn dispatch(&self, ctx: Context) -> bool {
        let found = {
            let table = self.table.read();
            table
                .handlers
                .get(&ctx.command_id)
                .or(table.fallback.as_ref())
                .cloned()
        };
        match found {
            Some(h) => {
                h(ctx).await;
                true
            }
            None => false,
        }
    }
}
