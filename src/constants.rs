/// Application constants

// Card faces dealt into every game (each one appears twice on the board)
pub const CARD_POOL: [&str; 6] = [
    "heartsAce",
    "diamondsAce",
    "clubsAce",
    "spadesAce",
    "joker",
    "heartsKing",
];

// Rendered in place of a face-down card
pub const CARD_BACK: &str = "back";

// Wire value for "no pending card this turn"
pub const NO_PENDING_FLIP: i64 = -1;

// Achievement names
pub const ACHIEVEMENT_WIN_ONE: &str = "memory-win-1";
pub const ACHIEVEMENT_WIN_FIVE: &str = "memory-win-5";
pub const ACHIEVEMENT_WIN_TEN: &str = "memory-win-10";
pub const ACHIEVEMENT_PLAY_ONCE: &str = "memory-first-play";
pub const ACHIEVEMENT_STREAK: &str = "memory-streak-4";

// Consecutive matches needed for the streak achievement
pub const STREAK_ACHIEVEMENT_THRESHOLD: u32 = 4;

// Store key prefixes
pub const GAME_KEY_PREFIX: &str = "memory:game:";
pub const STATS_KEY_PREFIX: &str = "memory:stats:";

// Request header carrying the authenticated chat user
pub const USER_ID_HEADER: &str = "x-user-id";

// Chat channel type for one-to-one direct messages
pub const DIRECT_CHANNEL_TYPE: &str = "D";

// API version
pub const API_VERSION: &str = "v1";

// WebSocket configuration
pub const WS_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const WS_CLIENT_TIMEOUT_SECS: u64 = 60;
pub const WS_CHANNEL_CAPACITY: usize = 100;

// Outbound HTTP timeouts
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 4;
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 10;
