//! Login listener commands: account handshake and server discovery.
//!
//! Credentials are not checked; any non-empty email gets a fresh session key.

use bytes::Bytes;
use log::{debug, info};
use rand::RngCore;

use seer_shared::{BodyReader, BodyWriter};

use super::Shared;
use crate::config::GameConfig;
use crate::network::Context;

const SESSION_KEY_LEN: usize = 16;
const EMAIL_WIDTH: usize = 64;

/// Result code for a rejected login
const LOGIN_REJECTED: i32 = 1;

pub async fn verify(_game: Shared, ctx: Context) {
    ctx.reply(&[]).await;
}

fn session_key() -> [u8; SESSION_KEY_LEN] {
    let mut key = [0u8; SESSION_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

fn login_body(key: &[u8; SESSION_KEY_LEN], role_created: bool) -> Bytes {
    let mut body = BodyWriter::with_capacity(SESSION_KEY_LEN + 4);
    body.put_bytes(key).put_u32(u32::from(role_created));
    body.finish()
}

pub async fn main_login(_game: Shared, ctx: Context) {
    let email = BodyReader::new(&ctx.body).read_fixed_str(EMAIL_WIDTH);
    if email.is_empty() {
        debug!("Rejected login without email from {}", ctx.connection);
        ctx.reply_with_result(LOGIN_REJECTED, &[]).await;
        return;
    }

    info!("Login for {} as user {}", email, ctx.user_id);
    ctx.reply_with_result(0, &login_body(&session_key(), true)).await;
}

/// Server id, online count, address and port of the single gateway
fn put_server_info(body: &mut BodyWriter, config: &GameConfig, online: u32) {
    body.put_u32(config.server_id)
        .put_u32(online)
        .put_fixed_str(&config.public_ip, 16)
        .put_u16(config.port)
        .put_u32(1); // friends
}

fn good_server_list_body(config: &GameConfig, online: u32) -> Bytes {
    let mut body = BodyWriter::with_capacity(50);
    body.put_u32(config.server_id) // max online id
        .put_u32(0) // vip
        .put_u32(1);
    put_server_info(&mut body, config, online);
    body.put_u32(0) // friend count
        .put_u32(0); // blacklist count
    body.finish()
}

pub async fn good_server_list(game: Shared, ctx: Context) {
    let online = u32::try_from(game.world.online_count()).unwrap_or(u32::MAX);
    ctx.reply_with_result(0, &good_server_list_body(&game.config, online)).await;
}

pub async fn server_list(game: Shared, ctx: Context) {
    let mut body = BodyWriter::with_capacity(34);
    body.put_u32(1);
    put_server_info(&mut body, &game.config, 0);
    ctx.reply_with_result(0, &body.finish()).await;
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use seer_shared::commands::{LOGIN_GOOD_SERVER_LIST, LOGIN_MAIN, LOGIN_SERVER_LIST, LOGIN_VERIFY};

    #[tokio::test]
    async fn test_verify_answers_empty() {
        let (ctx, mut stream) = request(LOGIN_VERIFY, 0, &[]);
        verify(game(), ctx).await;
        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.seq, 0);
        assert!(frame.body.is_empty());
    }

    #[tokio::test]
    async fn test_login_without_email_is_rejected() {
        let (ctx, mut stream) = request(LOGIN_MAIN, 0, &[0u8; 96]);
        main_login(game(), ctx).await;
        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.seq, LOGIN_REJECTED);
        assert!(frame.body.is_empty());
    }

    #[tokio::test]
    async fn test_login_returns_session_key() {
        let mut body = BodyWriter::new();
        body.put_fixed_str("seer@example.com", EMAIL_WIDTH).put_zeros(32);
        let (ctx, mut stream) = request(LOGIN_MAIN, 5, &body.finish());
        main_login(game(), ctx).await;

        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.seq, 0);
        assert_eq!(frame.user_id, 5);
        assert_eq!(frame.body.len(), SESSION_KEY_LEN + 4);
        assert_eq!(&frame.body[SESSION_KEY_LEN..], &[0, 0, 0, 1]);
    }

    #[tokio::test]
    async fn test_good_server_list_layout() {
        let game = game();
        let (conn_ctx, _conn_stream) = request(LOGIN_GOOD_SERVER_LIST, 9, &[]);
        game.world.register_connection(9, conn_ctx.connection.clone());

        let (ctx, mut stream) = request(LOGIN_GOOD_SERVER_LIST, 9, &[]);
        good_server_list(game.clone(), ctx).await;
        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.body.len(), 50);

        let mut reader = BodyReader::new(&frame.body);
        assert_eq!(reader.read_u32(), 1);
        assert_eq!(reader.read_u32(), 0);
        assert_eq!(reader.read_u32(), 1);
        assert_eq!(reader.read_u32(), 1); // server id
        assert_eq!(reader.read_u32(), 1); // online
        assert_eq!(reader.read_fixed_str(16), "127.0.0.1");
        assert_eq!(reader.read_u16(), 5000);
    }

    #[tokio::test]
    async fn test_server_list_has_one_entry() {
        let (ctx, mut stream) = request(LOGIN_SERVER_LIST, 0, &[]);
        server_list(game(), ctx).await;
        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.body.len(), 34);
        assert_eq!(BodyReader::new(&frame.body).read_u32(), 1);
    }
}
