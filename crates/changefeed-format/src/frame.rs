use crate::errors::FormatError;

/// Block magic bytes: `b"CFB1"`.
pub const MAGIC: &[u8; 4] = b"CFB1";

/// Current block format version: `0x0001`.
pub const VERSION: u16 = 0x0001;

/// Block header size in bytes: 16 bytes.
pub const BLOCK_HEADER_SIZE: usize = 16;

impl BlockHeader {
    /// Block header size constant.
    pub const SIZE: usize = 16;
}

/// Frame header size in bytes: 8 bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

impl RecordFrame {
    /// Frame header size constant.
    pub const FRAME_HEADER_SIZE: usize = 8;
}

/// Maximum payload size of a single record: 16 MiB.
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Maximum body size of a single block: 64 MiB.
pub const MAX_BLOCK_BODY_SIZE: u32 = 64 * 1024 * 1024;

/// Record frame kind: EventJson.
pub const FRAME_KIND_EVENT_JSON: u8 = 0x01;

/// Header that opens every block in a chunk (16 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Magic bytes: `"CFB1"`.
    pub magic: [u8; 4],
    /// Format version: `0x0001`.
    pub version: u16,
    /// Reserved flags (must be 0).
    pub flags: u16,
    /// Number of record frames in the block body.
    pub record_count: u32,
    /// Length of the block body in bytes.
    pub body_len: u32,
}

impl BlockHeader {
    /// Creates a header for a body of `record_count` frames spanning `body_len` bytes.
    pub fn new(record_count: u32, body_len: u32) -> Result<Self, FormatError> {
        if body_len > MAX_BLOCK_BODY_SIZE {
            return Err(FormatError::BlockTooLarge {
                size: body_len as u64,
                max: MAX_BLOCK_BODY_SIZE,
            });
        }
        Ok(Self {
            magic: *MAGIC,
            version: VERSION,
            flags: 0,
            record_count,
            body_len,
        })
    }

    /// Total block length (header plus body).
    pub fn block_len(&self) -> u64 {
        BLOCK_HEADER_SIZE as u64 + self.body_len as u64
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut bytes = [0u8; BLOCK_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.flags.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.record_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.body_len.to_le_bytes());
        bytes
    }

    /// Deserializes a header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < BLOCK_HEADER_SIZE {
            return Err(FormatError::InvalidBlockHeader(format!(
                "header too short: {} bytes",
                bytes.len()
            )));
        }

        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != *MAGIC {
            return Err(FormatError::InvalidBlockHeader(format!(
                "invalid magic: {:?}, expected {:?}",
                magic, MAGIC
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(FormatError::InvalidBlockHeader(format!(
                "unsupported version: 0x{:04x}, expected 0x{:04x}",
                version, VERSION
            )));
        }

        let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
        if flags != 0 {
            return Err(FormatError::InvalidBlockHeader(format!(
                "non-zero flags: 0x{:04x}",
                flags
            )));
        }

        let record_count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let body_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        if body_len > MAX_BLOCK_BODY_SIZE {
            return Err(FormatError::BlockTooLarge {
                size: body_len as u64,
                max: MAX_BLOCK_BODY_SIZE,
            });
        }
        // Every record needs at least a frame header inside the body.
        if record_count as u64 * FRAME_HEADER_SIZE as u64 > body_len as u64 {
            return Err(FormatError::InvalidBlockHeader(format!(
                "{} records cannot fit in a body of {} bytes",
                record_count, body_len
            )));
        }

        Ok(Self {
            magic,
            version,
            flags,
            record_count,
            body_len,
        })
    }
}

/// Record frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// EventJson: UTF-8 JSON object holding one change event.
    EventJson,
    /// Unknown/unsupported frame kind.
    Unknown(u8),
}

impl FrameKind {
    /// Creates a FrameKind from a byte value.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            FRAME_KIND_EVENT_JSON => FrameKind::EventJson,
            _ => FrameKind::Unknown(byte),
        }
    }

    /// Returns the byte value for this kind.
    pub fn to_byte(self) -> u8 {
        match self {
            FrameKind::EventJson => FRAME_KIND_EVENT_JSON,
            FrameKind::Unknown(b) => b,
        }
    }
}

/// Record frame header (8 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFrame {
    /// Frame kind.
    pub kind: FrameKind,
    /// Reserved bytes (must be all zeros).
    pub reserved: [u8; 3],
    /// Payload length in bytes (little-endian).
    pub len: u32,
}

impl RecordFrame {
    /// Creates a new frame header.
    pub fn new(kind: FrameKind, len: u32) -> Result<Self, FormatError> {
        if len > MAX_PAYLOAD_SIZE {
            return Err(FormatError::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self {
            kind,
            reserved: [0; 3],
            len,
        })
    }

    /// Serializes the frame header to bytes.
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut bytes = [0u8; FRAME_HEADER_SIZE];
        bytes[0] = self.kind.to_byte();
        bytes[1..4].copy_from_slice(&self.reserved);
        bytes[4..8].copy_from_slice(&self.len.to_le_bytes());
        bytes
    }

    /// Deserializes a frame header from bytes.
    ///
    /// `offset` is only used to label errors.
    pub fn from_bytes(bytes: &[u8], offset: u64) -> Result<Self, FormatError> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(FormatError::InvalidFrame {
                offset,
                reason: format!("frame header too short: {} bytes", bytes.len()),
            });
        }

        let kind = FrameKind::from_byte(bytes[0]);
        let reserved = [bytes[1], bytes[2], bytes[3]];
        if reserved != [0u8; 3] {
            return Err(FormatError::InvalidFrame {
                offset,
                reason: "non-zero reserved bytes".to_string(),
            });
        }
        let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        if len > MAX_PAYLOAD_SIZE {
            return Err(FormatError::InvalidFrame {
                offset,
                reason: format!("payload size {} exceeds maximum {}", len, MAX_PAYLOAD_SIZE),
            });
        }

        Ok(Self { kind, reserved, len })
    }
}
