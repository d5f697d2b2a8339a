//! Transport channel for chunked uploads.
//!
//! A channel carries an ordered sequence of chunk frames from sender to
//! receiver, one end-of-input marker, and exactly one terminal status back.
//! Both ends are generic over `AsyncRead`/`AsyncWrite`, so the same session
//! logic runs over an in-process duplex pipe or a TCP connection.
//!
//! # Wire format
//!
//! See [`wire`] for the frame layout.

pub mod channel;
pub mod client;
pub mod error;
pub mod server;
pub mod wire;

pub use channel::{ChunkReceiver, ChunkSender, MemoryReceiver, MemorySender, pair};
pub use client::{TcpChunkSender, TcpDataClient};
pub use error::DataChannelError;
pub use server::{TcpChunkReceiver, TcpDataServer};

use std::time::Duration;

/// TCP read/write buffer size (256 KB).
pub const TCP_BUFFER_SIZE: usize = 256 * 1024;

/// Timeout for the TCP connection attempt.
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default buffer capacity of an in-process channel (64 KB).
pub const DUPLEX_CAPACITY: usize = 64 * 1024;
