//! Network layer contracts.
//!
//! # Data Flow
//! ```text
//! native connection
//!     → address.rs (local/remote socket addresses)
//!     → client IP, local port and server name for the neutral request
//! ```

pub mod address;

pub use address::{
    client_ip, local_inet, AddressPreference, ConnectionAddresses, InetSocketAddress,
    NativeChannel, SocketAddress,
};
