//! Costanti di dominio condivise tra engine, gateway e API.

// Session types
pub const SESSION_TYPE_SINGLE: i32 = 1;
pub const SESSION_TYPE_GROUP: i32 = 2;

// Message types
pub const MSG_TYPE_TEXT: i32 = 1;
pub const MSG_TYPE_IMAGE: i32 = 2;
pub const MSG_TYPE_VIDEO: i32 = 3;
pub const MSG_TYPE_AUDIO: i32 = 4;
pub const MSG_TYPE_FILE: i32 = 5;
pub const MSG_TYPE_CUSTOM: i32 = 100;

// Group status
pub const GROUP_STATUS_NORMAL: i32 = 0;
pub const GROUP_STATUS_DISMISSED: i32 = 1;

// Group member status
pub const GROUP_MEMBER_STATUS_NORMAL: i32 = 0;
pub const GROUP_MEMBER_STATUS_LEFT: i32 = 1;
pub const GROUP_MEMBER_STATUS_KICKED: i32 = 2;

// Group member role levels
pub const ROLE_LEVEL_MEMBER: i32 = 0;
pub const ROLE_LEVEL_ADMIN: i32 = 1;
pub const ROLE_LEVEL_OWNER: i32 = 2;

// Receive message options
pub const RECV_MSG_OPT_NORMAL: i32 = 0;
pub const RECV_MSG_OPT_NO_NOTIFY: i32 = 1;
pub const RECV_MSG_OPT_NOT_RECV: i32 = 2;

// Platform ids
pub const PLATFORM_ID_UNKNOWN: i32 = 0;
pub const PLATFORM_ID_IOS: i32 = 1;
pub const PLATFORM_ID_ANDROID: i32 = 2;
pub const PLATFORM_ID_WINDOWS: i32 = 3;
pub const PLATFORM_ID_MACOS: i32 = 4;
pub const PLATFORM_ID_WEB: i32 = 5;

/// Nome leggibile della piattaforma, usato solo nel logging.
pub fn platform_name(platform_id: i32) -> &'static str {
    match platform_id {
        PLATFORM_ID_IOS => "iOS",
        PLATFORM_ID_ANDROID => "Android",
        PLATFORM_ID_WINDOWS => "Windows",
        PLATFORM_ID_MACOS => "macOS",
        PLATFORM_ID_WEB => "Web",
        _ => "Unknown",
    }
}

// Conversation id prefixes
pub const SINGLE_CONVERSATION_PREFIX: &str = "si_";
pub const GROUP_CONVERSATION_PREFIX: &str = "sg_";

/// Timestamp corrente in millisecondi Unix. Tutti i campi temporali
/// persistiti usano questa risoluzione.
pub fn now_unix_milli() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
