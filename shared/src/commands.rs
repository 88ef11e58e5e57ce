//! Command identifiers understood by the legacy client.

// =============================================================================
// Login listener
// =============================================================================

pub const LOGIN_VERIFY: i32 = 1;
pub const LOGIN_MAIN: i32 = 104;
pub const LOGIN_GOOD_SERVER_LIST: i32 = 105;
pub const LOGIN_SERVER_LIST: i32 = 106;

// =============================================================================
// Gateway: session
// =============================================================================

pub const LOGIN_IN: i32 = 1001;
pub const SYSTEM_TIME: i32 = 1002;

// =============================================================================
// Gateway: maps
// =============================================================================

pub const ENTER_MAP: i32 = 2001;
pub const LEAVE_MAP: i32 = 2002;
pub const LIST_MAP_PLAYER: i32 = 2003;
pub const MAP_OGRE_LIST: i32 = 2004;
pub const PEOPLE_WALK: i32 = 2101;
pub const CHAT: i32 = 2102;

// =============================================================================
// Gateway: pets
// =============================================================================

pub const GET_PET_INFO: i32 = 2301;
pub const GET_PET_LIST: i32 = 2303;

// =============================================================================
// Gateway: tasks
// =============================================================================

pub const COMPLETE_TASK: i32 = 2202;

// =============================================================================
// Gateway: fights
// =============================================================================

pub const READY_TO_FIGHT: i32 = 2404;
pub const USE_SKILL: i32 = 2405;
pub const FIGHT_NPC_MONSTER: i32 = 2408;
pub const CATCH_MONSTER: i32 = 2409;
pub const ESCAPE_FIGHT: i32 = 2410;
pub const CHALLENGE_BOSS: i32 = 2411;
pub const NOTE_READY_TO_FIGHT: i32 = 2503;
pub const NOTE_START_FIGHT: i32 = 2504;
pub const NOTE_USE_SKILL: i32 = 2505;
pub const FIGHT_OVER: i32 = 2506;
pub const NOTE_UPDATE_PROP: i32 = 2508;

/// Commands answered with four zero bytes
pub const STUB_ZERO_U32: &[i32] = &[
    5001, 5002, 3201, 9757, 2442, 2444, 2445, 2446,
    2053, 2054, 2055,
    2302, 2306, 2307, 2308, 2309, 2310, 2311, 2312, 2313, 2314, 2315, 2316,
    2320, 2321, 2322, 2323, 2324, 2327, 2328, 2329, 2330, 2331, 2332,
    3401, 3402, 3403, 3406, 3407,
    2414, 2415, 2416, 2417, 2418, 2419, 2420, 2421, 2422, 2423, 2424, 2425, 2426, 2428, 2429, 2430,
    4001, 4002, 4003, 4004, 4005, 4006, 4007, 4008, 4009, 4010, 4011, 4012, 4013, 4014,
    10001, 10002, 10003, 10004, 10005, 10007, 10008, 10009,
];

/// Commands answered with an empty body
pub const STUB_EMPTY: &[i32] = &[
    5003, 1011, 1016, 2289, 2192, 2196, 2361, 3405, 4359, 4364, 4501, 5005,
    9112, 9677, 40006, 40007,
];
