//! Gateway Message Types
//!
//! Protobuf messages spoken by the game gateway. Only the messages the client
//! engine itself needs are modelled: the envelope, login, heartbeat and the
//! push notifications the dispatcher understands. Everything else travels as
//! opaque bytes.

/// Service hosting login and heartbeat.
pub const USER_SERVICE: &str = "gamepb.userpb.UserService";

/// Login method name.
pub const LOGIN_METHOD: &str = "Login";

/// Heartbeat method name.
pub const HEARTBEAT_METHOD: &str = "Heartbeat";

/// Outer frame
#[derive(Clone, PartialEq, prost::Message)]
pub struct GateMessage {
    #[prost(message, optional, tag = "1")]
    pub meta: Option<Meta>,
    #[prost(bytes = "vec", tag = "2")]
    pub body: Vec<u8>,
}

/// Routing metadata
#[derive(Clone, PartialEq, prost::Message)]
pub struct Meta {
    #[prost(string, tag = "1")]
    pub service_name: String,
    #[prost(string, tag = "2")]
    pub method_name: String,
    #[prost(int32, tag = "3")]
    pub message_type: i32,
    #[prost(int64, tag = "4")]
    pub client_seq: i64,
    #[prost(int64, tag = "5")]
    pub server_seq: i64,
    #[prost(int64, tag = "6")]
    pub error_code: i64,
    #[prost(string, tag = "7")]
    pub error_message: String,
}

/// Body of every push frame
#[derive(Clone, PartialEq, prost::Message)]
pub struct EventMessage {
    #[prost(string, tag = "1")]
    pub message_type: String,
    #[prost(bytes = "vec", tag = "2")]
    pub body: Vec<u8>,
}

// Login

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceInfo {
    #[prost(string, tag = "1")]
    pub client_version: String,
    #[prost(string, tag = "2")]
    pub sys_software: String,
    #[prost(string, tag = "3")]
    pub network: String,
    #[prost(int32, tag = "4")]
    pub memory: i32,
    #[prost(string, tag = "5")]
    pub device_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReportData {
    #[prost(string, tag = "1")]
    pub callback: String,
    #[prost(string, tag = "2")]
    pub cd_extend_info: String,
    #[prost(string, tag = "3")]
    pub click_id: String,
    #[prost(string, tag = "4")]
    pub clue_token: String,
    #[prost(string, tag = "5")]
    pub minigame_channel: String,
    #[prost(int32, tag = "6")]
    pub minigame_platid: i32,
    #[prost(string, tag = "7")]
    pub req_id: String,
    #[prost(string, tag = "8")]
    pub trackid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LoginRequest {
    #[prost(int64, tag = "1")]
    pub sharer_id: i64,
    #[prost(string, tag = "2")]
    pub sharer_open_id: String,
    #[prost(message, optional, tag = "3")]
    pub device_info: Option<DeviceInfo>,
    #[prost(int64, tag = "4")]
    pub share_cfg_id: i64,
    #[prost(string, tag = "5")]
    pub scene_id: String,
    #[prost(message, optional, tag = "6")]
    pub report_data: Option<ReportData>,
}

/// Player profile as carried by login replies and basic notifications
#[derive(Clone, PartialEq, prost::Message)]
pub struct UserBasic {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int64, tag = "3")]
    pub level: i64,
    #[prost(int64, tag = "4")]
    pub gold: i64,
    #[prost(int64, tag = "5")]
    pub exp: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LoginReply {
    #[prost(message, optional, tag = "1")]
    pub basic: Option<UserBasic>,
    #[prost(int64, tag = "2")]
    pub time_now_millis: i64,
}

// Heartbeat

#[derive(Clone, PartialEq, prost::Message)]
pub struct HeartbeatRequest {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub client_version: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HeartbeatReply {
    /// Server time in milliseconds
    #[prost(int64, tag = "1")]
    pub server_time: i64,
}

// Push notifications

#[derive(Clone, PartialEq, prost::Message)]
pub struct BasicNotify {
    #[prost(message, optional, tag = "1")]
    pub basic: Option<UserBasic>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Item {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub count: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ItemChange {
    #[prost(message, optional, tag = "1")]
    pub item: Option<Item>,
    #[prost(int64, tag = "2")]
    pub delta: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ItemNotify {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<ItemChange>,
}

/// One plot of land as reported by the server
#[derive(Clone, PartialEq, prost::Message)]
pub struct LandInfo {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub plant_id: i64,
    #[prost(string, tag = "3")]
    pub plant_name: String,
    /// Unix seconds; zero when nothing is growing
    #[prost(int64, tag = "4")]
    pub mature_time: i64,
    #[prost(int32, tag = "5")]
    pub phase: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LandsNotify {
    #[prost(int64, tag = "1")]
    pub host_gid: i64,
    #[prost(message, repeated, tag = "2")]
    pub lands: Vec<LandInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FriendApplication {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FriendApplicationReceivedNotify {
    #[prost(message, repeated, tag = "1")]
    pub applications: Vec<FriendApplication>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FriendInfo {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub remark: String,
    #[prost(int64, tag = "4")]
    pub level: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FriendAddedNotify {
    #[prost(message, repeated, tag = "1")]
    pub friends: Vec<FriendInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GoodsInfo {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GoodsUnlockNotify {
    #[prost(message, repeated, tag = "1")]
    pub goods_list: Vec<GoodsInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskInfo {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int32, tag = "2")]
    pub progress: i32,
    #[prost(int32, tag = "3")]
    pub target: i32,
    #[prost(bool, tag = "4")]
    pub claimable: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskInfoNotify {
    #[prost(message, optional, tag = "1")]
    pub task_info: Option<TaskInfo>,
}
