//! Call/return transport between one client and the server.

use crate::{CallHeader, Dataport, ErrorCode, ReplyHeader};

/// A single-call-in-flight RPC channel.
///
/// The caller stages inputs in [`Channel::dataport`], invokes
/// [`Channel::call`] with scalar registers only, and blocks until the reply
/// header is returned with outputs staged in the same dataport. Taking
/// `&mut self` is what limits a channel to one in-flight call.
pub trait Channel: Send {
    /// Payload buffer shared with the server for this channel.
    fn dataport(&self) -> &Dataport;

    /// Invoke the cross-boundary entrypoint.
    ///
    /// # Errors
    ///
    /// `ErrorCode::ConnectionClosed` if the transport cannot deliver the call.
    /// Operation failures are reported in the reply header, not here.
    fn call(&mut self, request: &CallHeader) -> Result<ReplyHeader, ErrorCode>;
}
