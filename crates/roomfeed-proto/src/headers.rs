//! Header names used by the client and the broker.

/// Protocol versions offered on connect.
pub const ACCEPT_VERSION: &str = "accept-version";
/// Virtual host requested on connect.
pub const HOST: &str = "host";
/// Heart-beat negotiation.
pub const HEART_BEAT: &str = "heart-beat";
/// Bearer credential forwarded on connect.
pub const AUTHORIZATION: &str = "Authorization";
/// Negotiated protocol version.
pub const VERSION: &str = "version";
/// Broker session identifier.
pub const SESSION: &str = "session";
/// Target or source destination.
pub const DESTINATION: &str = "destination";
/// Subscription identifier chosen by the client.
pub const ID: &str = "id";
/// Subscription a MESSAGE was routed through.
pub const SUBSCRIPTION: &str = "subscription";
/// Broker-assigned message identifier.
pub const MESSAGE_ID: &str = "message-id";
/// Receipt requested by the client.
pub const RECEIPT: &str = "receipt";
/// Receipt being acknowledged by the broker.
pub const RECEIPT_ID: &str = "receipt-id";
/// Short error description on ERROR frames.
pub const MESSAGE: &str = "message";
/// Body length in octets.
pub const CONTENT_LENGTH: &str = "content-length";
/// Body MIME type.
pub const CONTENT_TYPE: &str = "content-type";
/// Acknowledgement mode of a subscription.
pub const ACK: &str = "ack";
