use serde::{Deserialize, Serialize};
use smiling_engine::ExpiryWindow;

/// JSON embedded in the watch page's `server-response` meta tag.
#[derive(Debug, Deserialize)]
pub struct ServerResponse {
    pub meta: ResponseMeta,
    pub data: ServerResponseData,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMeta {
    pub status: u16,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerResponseData {
    pub response: WatchResponse,
}

#[derive(Debug, Deserialize)]
pub struct WatchResponse {
    pub client: WatchClient,
    pub media: Media,
    pub payment: Payment,
    pub video: Video,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchClient {
    pub watch_track_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Media {
    pub domand: Option<Domand>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domand {
    pub access_right_key: String,
    pub audios: Vec<DomandItem>,
    pub videos: Vec<DomandItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomandItem {
    pub id: String,
    pub is_available: bool,
    pub quality_level: u32,
}

#[derive(Debug, Deserialize)]
pub struct Payment {
    pub video: PaymentVideo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVideo {
    pub is_admission: bool,
    pub is_premium: bool,
    pub is_ppv: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub is_deleted: bool,
}

/// Body of the access-rights request: one `[video, audio]` output pair.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AccessRightsRequest {
    pub outputs: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
pub struct AccessRightsResponse {
    pub meta: ResponseMeta,
    pub data: ExpiryWindow,
}
