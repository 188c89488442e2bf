/// Longest accepted username, in bytes.
pub const MAX_USERNAME_LEN: usize = 64;

/// Longest accepted password, in bytes. Hashing is cheap but unbounded input is not.
pub const MAX_PASSWORD_LEN: usize = 256;

/// Longest accepted room name, in bytes.
pub const MAX_ROOM_NAME_LEN: usize = 128;

/// Longest request line the front end will buffer.
pub const MAX_REQUEST_LINE_LEN: usize = 16 * 1024;

/// Widest window accepted by the free-window query, in days.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 366;

/// Rooms a single data directory may hold.
pub const MAX_ROOMS: usize = 10_000;
