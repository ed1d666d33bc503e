/// Transport kernel - exchange-agnostic plumbing
///
/// The kernel contains only transport logic and generic interfaces:
///
/// - `RestClient` / `ReqwestRest`: unified HTTP client interface
/// - `WsSession` / `TungsteniteWs`: a single physical WebSocket connection
/// - `Signer` / `HmacSigner`: pluggable request authentication
/// - `WsCodec`: wire-format encoding/decoding
///
/// Reconnection policy deliberately does not live here; it belongs to the
/// stream supervisor in the exchange module, which owns the attempt counter
/// and subscription replay. The `WsSession` trait is the seam that lets
/// tests drive the supervisor with a scripted mock transport.
pub mod codec;
pub mod rest;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use codec::WsCodec;
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use signer::{HmacSigner, SignatureResult, Signer};
pub use ws::{TungsteniteWs, WsSession};
