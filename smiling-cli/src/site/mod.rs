mod error;
pub mod models;

pub use error::SiteError;

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use smiling_engine::{ExpiryWindow, HttpClient, Quality};
use tracing::{debug, info};
use url::Url;

use models::{
    AccessRightsRequest, AccessRightsResponse, Domand, DomandItem, ServerResponse, WatchResponse,
};

pub static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:sm|nm|so)\d+)\b").unwrap());

static META_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<meta\b[^>]*>").unwrap());

static ATTRIBUTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

static ENTITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9a-fA-F]+)|([a-zA-Z]+));").unwrap());

const WATCH_URL: &str = "https://www.nicovideo.jp/watch/";
const API_URL: &str = "https://nvapi.nicovideo.jp/v1/watch/";

/// Extract the single video id contained in `input`.
pub fn parse_id(input: &str) -> Result<String, SiteError> {
    let ids: Vec<&str> = ID_REGEX
        .captures_iter(input)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();
    match ids.as_slice() {
        [id] => Ok((*id).to_string()),
        [] => Err(SiteError::InvalidInput(format!(
            "No video ID found in {input:?}"
        ))),
        all => Err(SiteError::InvalidInput(format!(
            "Multiple video IDs found: {all:?}"
        ))),
    }
}

/// Decode the HTML character references that appear in attribute values.
pub fn unescape_html(text: &str) -> Cow<'_, str> {
    ENTITY_REGEX.replace_all(text, |caps: &Captures| {
        let decoded = if let Some(dec) = caps.get(1) {
            dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
        } else if let Some(hex) = caps.get(2) {
            u32::from_str_radix(hex.as_str(), 16)
                .ok()
                .and_then(char::from_u32)
        } else {
            match caps.get(3).map(|m| m.as_str()) {
                Some("quot") => Some('"'),
                Some("amp") => Some('&'),
                Some("lt") => Some('<'),
                Some("gt") => Some('>'),
                Some("apos") => Some('\''),
                Some("nbsp") => Some('\u{a0}'),
                _ => None,
            }
        };
        match decoded {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    })
}

fn server_response_content(html: &str) -> Option<String> {
    META_TAG_REGEX.find_iter(html).find_map(|tag| {
        let mut name = None;
        let mut content = None;
        for attr in ATTRIBUTE_REGEX.captures_iter(tag.as_str()) {
            let value = attr.get(2).or_else(|| attr.get(3)).map(|m| m.as_str());
            match attr[1].to_ascii_lowercase().as_str() {
                "name" => name = value,
                "content" => content = value,
                _ => {}
            }
        }
        (name == Some("server-response"))
            .then_some(content)
            .flatten()
            .map(|c| unescape_html(c).into_owned())
    })
}

/// Parse the watch page into the embedded player response.
pub fn parse_watch_page(html: &str) -> Result<WatchResponse, SiteError> {
    let content = server_response_content(html).ok_or(SiteError::MetaNotFound)?;
    let parsed: ServerResponse = serde_json::from_str(&content)?;
    if parsed.meta.status != 200 || parsed.meta.code.as_deref().is_some_and(|c| c != "HTTP_200") {
        return Err(SiteError::Validation(format!(
            "unexpected server-response status {} ({:?})",
            parsed.meta.status, parsed.meta.code
        )));
    }
    Ok(parsed.data.response)
}

/// Check that `response` describes a free, available video with domand streams.
pub fn check_playable<'a>(response: &'a WatchResponse, id: &str) -> Result<&'a Domand, SiteError> {
    if response.video.id != id {
        return Err(SiteError::Validation(format!(
            "watch page describes {} instead of {id}",
            response.video.id
        )));
    }
    if response.video.is_deleted {
        return Err(SiteError::Validation(format!("{id} has been deleted")));
    }
    let payment = &response.payment.video;
    if payment.is_admission || payment.is_premium || payment.is_ppv {
        return Err(SiteError::Validation(format!("{id} requires payment")));
    }
    response
        .media
        .domand
        .as_ref()
        .ok_or_else(|| SiteError::NotImplemented(format!("{id} has no domand streams")))
}

fn pick(items: &[DomandItem], highest: bool, kind: &str) -> Result<String, SiteError> {
    let available = items.iter().filter(|i| i.is_available);
    let chosen = if highest {
        available.max_by_key(|i| i.quality_level)
    } else {
        available.min_by_key(|i| i.quality_level)
    };
    chosen
        .map(|i| i.id.clone())
        .ok_or_else(|| SiteError::Validation(format!("no available {kind} stream")))
}

/// The `[video, audio]` pair to request: audio by quality, video always the lightest.
pub fn select_outputs(domand: &Domand, quality: Quality) -> Result<AccessRightsRequest, SiteError> {
    let audio = pick(&domand.audios, quality == Quality::Best, "audio")?;
    let video = pick(&domand.videos, false, "video")?;
    Ok(AccessRightsRequest {
        outputs: vec![[video, audio]],
    })
}

fn access_rights_headers(access_right_key: &str) -> Result<HeaderMap, SiteError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-access-right-key"),
        HeaderValue::from_str(access_right_key)
            .map_err(|e| SiteError::Validation(format!("invalid access right key: {e}")))?,
    );
    headers.insert(
        HeaderName::from_static("x-frontend-id"),
        HeaderValue::from_static("6"),
    );
    headers.insert(
        HeaderName::from_static("x-frontend-version"),
        HeaderValue::from_static("0"),
    );
    headers.insert(
        HeaderName::from_static("x-request-with"),
        HeaderValue::from_static("https://www.nicovideo.jp"),
    );
    Ok(headers)
}

/// Turns a video id into the access window of its audio rendition.
pub struct NicoResolver {
    client: HttpClient,
}

impl NicoResolver {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, id: &str, quality: Quality) -> Result<ExpiryWindow, SiteError> {
        let watch_url = Url::parse(WATCH_URL)?.join(id)?;
        debug!(id = %id, url = %watch_url, "Fetching watch page");
        let page = self.client.get_document(&watch_url).await?;
        let response = parse_watch_page(&String::from_utf8_lossy(&page))?;
        let domand = check_playable(&response, id)?;
        let body = select_outputs(domand, quality)?;
        debug!(id = %id, outputs = ?body.outputs, "Requesting access rights");

        let api_url = Url::parse_with_params(
            &format!("{API_URL}{id}/access-rights/hls"),
            &[("actionTrackId", response.client.watch_track_id.as_str())],
        )?;
        let headers = access_rights_headers(&domand.access_right_key)?;
        let raw = self.client.post_json(&api_url, headers, &body).await?;
        let granted: AccessRightsResponse = serde_json::from_slice(&raw)?;
        if granted.meta.status != 201 {
            return Err(SiteError::Validation(format!(
                "unexpected access-rights status {}",
                granted.meta.status
            )));
        }

        info!(
            id = %id,
            expires = %granted.data.expire_time,
            "Access granted"
        );
        Ok(granted.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_RESPONSE: &str = r#"{"meta":{"status":200,"code":"HTTP_200"},"data":{"response":{"client":{"watchTrackId":"abc_123"},"media":{"domand":{"accessRightKey":"key&more","audios":[{"id":"audio-aac-64kbps","isAvailable":true,"qualityLevel":0},{"id":"audio-aac-192kbps","isAvailable":true,"qualityLevel":2},{"id":"audio-aac-320kbps","isAvailable":false,"qualityLevel":3}],"videos":[{"id":"video-h264-720p","isAvailable":true,"qualityLevel":3},{"id":"video-h264-144p","isAvailable":true,"qualityLevel":0}]}},"payment":{"video":{"isAdmission":false,"isPremium":false,"isPpv":false}},"video":{"id":"sm9","isDeleted":false,"title":"x"}}}}"#;

    fn escape(text: &str) -> String {
        text.replace('&', "&amp;").replace('"', "&quot;")
    }

    fn watch_page(json: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
             <meta name=\"server-response\" content=\"{}\"></head><body></body></html>",
            escape(json)
        )
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("sm9").unwrap(), "sm9");
        assert_eq!(
            parse_id("https://www.nicovideo.jp/watch/so12345?ref=top").unwrap(),
            "so12345"
        );
        assert!(matches!(parse_id("hello"), Err(SiteError::InvalidInput(_))));
        assert!(matches!(parse_id("sm1 nm2"), Err(SiteError::InvalidInput(_))));
        assert!(parse_id("xsm9").is_err());
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(
            unescape_html("&quot;a&quot; &amp; &#60;b&#x3E; &unknown;"),
            "\"a\" & <b> &unknown;"
        );
        assert!(matches!(unescape_html("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_parse_watch_page() {
        let response = parse_watch_page(&watch_page(SERVER_RESPONSE)).unwrap();
        assert_eq!(response.client.watch_track_id, "abc_123");
        let domand = check_playable(&response, "sm9").unwrap();
        assert_eq!(domand.access_right_key, "key&more");
        assert_eq!(domand.audios.len(), 3);
    }

    #[test]
    fn test_meta_attribute_order_does_not_matter() {
        let html = format!(
            "<meta content='{}' name=\"server-response\">",
            escape(SERVER_RESPONSE)
        );
        assert!(parse_watch_page(&html).is_ok());
    }

    #[test]
    fn test_missing_meta_tag() {
        assert!(matches!(
            parse_watch_page("<html><head></head></html>"),
            Err(SiteError::MetaNotFound)
        ));
    }

    #[test]
    fn test_bad_meta_status() {
        let json = SERVER_RESPONSE.replace(r#""status":200,"code":"HTTP_200""#, r#""status":404,"code":"HTTP_404""#);
        assert!(matches!(
            parse_watch_page(&watch_page(&json)),
            Err(SiteError::Validation(_))
        ));
    }

    #[test]
    fn test_check_playable_rejections() {
        let response = parse_watch_page(&watch_page(SERVER_RESPONSE)).unwrap();
        assert!(matches!(
            check_playable(&response, "sm10"),
            Err(SiteError::Validation(_))
        ));

        let paid = SERVER_RESPONSE.replace(r#""isPremium":false"#, r#""isPremium":true"#);
        let response = parse_watch_page(&watch_page(&paid)).unwrap();
        assert!(matches!(
            check_playable(&response, "sm9"),
            Err(SiteError::Validation(_))
        ));

        let no_domand = SERVER_RESPONSE.replace(r#""media":{"domand":"#, r#""media":{"delivery":"#);
        let response = parse_watch_page(&watch_page(&no_domand)).unwrap();
        assert!(matches!(
            check_playable(&response, "sm9"),
            Err(SiteError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_select_outputs() {
        let response = parse_watch_page(&watch_page(SERVER_RESPONSE)).unwrap();
        let domand = check_playable(&response, "sm9").unwrap();

        let best = select_outputs(domand, Quality::Best).unwrap();
        assert_eq!(
            best.outputs,
            vec![["video-h264-144p".to_string(), "audio-aac-192kbps".to_string()]]
        );
        let worst = select_outputs(domand, Quality::Worst).unwrap();
        assert_eq!(worst.outputs[0][1], "audio-aac-64kbps");
        assert_eq!(
            serde_json::to_string(&worst).unwrap(),
            r#"{"outputs":[["video-h264-144p","audio-aac-64kbps"]]}"#
        );
    }

    #[test]
    fn test_access_rights_response() {
        let granted: AccessRightsResponse = serde_json::from_str(
            r#"{"meta":{"status":201},"data":{"contentUrl":"https://delivery.domand.nicovideo.jp/hlsbid/x/playlists/variants/y.m3u8?session=z","createTime":"2024-05-01T12:00:00+09:00","expireTime":"2024-05-02T12:00:00+09:00"}}"#,
        )
        .unwrap();
        assert_eq!(granted.meta.status, 201);
        assert!(granted.data.content_url.ends_with("session=z"));
    }

    #[test]
    fn test_access_rights_headers() {
        let headers = access_rights_headers("token").unwrap();
        assert_eq!(headers["x-frontend-id"], "6");
        assert_eq!(headers["x-request-with"], "https://www.nicovideo.jp");
        assert!(access_rights_headers("bad\nkey").is_err());
    }
}
