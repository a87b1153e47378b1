pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

pub const DEFAULT_RELAY_PORT: u16 = 4001;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

pub const DEFAULT_CHAT_KIND: &str = "text";

pub const MAX_CHAT_CONTENT_BYTES: usize = 4096;
