/// Hard ceiling on a chunk payload: 4 MiB.
pub const MAX_CHUNK_SIZE: usize = 1 << 22;

/// Chunk size used when none is configured: 4 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 12;

/// Message carried by a successful terminal status.
pub const STATUS_OK_MESSAGE: &str = "upload received with success";
