//! Network layer: listeners, connections and command dispatch.

mod connection;
mod policy;
mod registry;
mod server;

pub use connection::Connection;
pub use policy::{run_policy_listener, POLICY_REQUEST, POLICY_RESPONSE};
pub use registry::{handler, CommandRegistry, Context, Handler};
pub use server::{
    send_response, send_response_with_result, CloseHook, ConnectionServer, Flavor, ListenerOptions,
    ServerError,
};
