//! Protocol constants

/// Start-of-frame marker
pub const STX: u8 = 0xA5;

/// Added to the command byte to form the response ack byte
pub const ACK_OFFSET: u8 = 0x80;

/// Default connection timeout (seconds)
pub const DEFAULT_TIMEOUT: u64 = 5;

/// Seconds from the Unix epoch to 2000-01-02 00:00:00.
///
/// The vendor documents record times as seconds since 2000-01-01, but
/// devices count from the following day.
pub const RECORD_EPOCH_UNIX: i64 = 946_771_200;

/// Year the single-byte clock year is offset from
pub const CLOCK_BASE_YEAR: i32 = 2000;

/// Bulk transfer parameters
pub mod transfer {
    /// Records per download/upload request
    pub const RECORD_CHUNK: u32 = 25;

    /// Staff entries per download/upload request
    pub const STAFF_CHUNK: u32 = 12;

    /// First record request: every stored record
    pub const RECORDS_ALL: u8 = 1;

    /// First record request: only records not yet cleared
    pub const RECORDS_NEW: u8 = 2;

    /// First staff request
    pub const STAFF_FIRST: u8 = 1;

    /// Every request after the first
    pub const CONTINUATION: u8 = 0;
}

/// Clear-records request modes
pub mod clear {
    /// Drop every new-record mark
    pub const ALL_NEW_MARKS: u8 = 1;

    /// Drop the given number of new-record marks
    pub const NEW_MARKS: u8 = 2;

    /// Largest amount expressible in the 24-bit amount field
    pub const MAX_AMOUNT: u32 = 0xFF_FFFF;
}
