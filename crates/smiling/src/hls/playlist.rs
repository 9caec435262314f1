// HLS Manifest Resolver: master playlist -> default audio rendition -> media playlist.

use std::sync::Arc;

use m3u8_rs::{AlternativeMediaType, KeyMethod, MasterPlaylist, MediaPlaylist};
use tracing::{debug, info};
use url::Url;

use crate::DownloadError;
use crate::hls::fetcher::ResourceFetcher;

/// The only `#EXT-X-VERSION` this resolver accepts.
pub const SUPPORTED_VERSION: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub uri: Url,
    pub iv: [u8; 16],
}

/// Everything needed to fetch and decrypt one rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionManifest {
    pub url: Url,
    pub version: usize,
    pub key: KeyInfo,
    pub init_segment: Url,
    pub segments: Vec<Url>,
    pub target_duration: Option<u64>,
}

pub struct ManifestResolver<F: ?Sized> {
    fetcher: Arc<F>,
}

impl<F> ManifestResolver<F>
where
    F: ResourceFetcher + ?Sized,
{
    pub fn new(fetcher: Arc<F>) -> Self {
        Self { fetcher }
    }

    /// Fetches the master playlist at `master_url` and resolves it.
    pub async fn load(&self, master_url: &Url) -> Result<RenditionManifest, DownloadError> {
        let master = self.fetcher.fetch_document(master_url).await?;
        self.resolve(master_url, &master).await
    }

    /// Selects the default audio rendition from `master` and resolves its media playlist.
    pub async fn resolve(
        &self,
        master_url: &Url,
        master: &[u8],
    ) -> Result<RenditionManifest, DownloadError> {
        let master_playlist = parse_master(master)?;
        let rendition_uri = select_audio_rendition(&master_playlist)?;
        let media_url = master_url.join(rendition_uri).map_err(|e| {
            DownloadError::Manifest(format!(
                "Could not join {master_url} with rendition URI {rendition_uri}: {e}"
            ))
        })?;
        debug!(url = %media_url, "Selected default audio rendition");

        let media = self.fetcher.fetch_document(&media_url).await?;
        let manifest = parse_media(&media_url, &media)?;
        info!(
            url = %manifest.url,
            segments = manifest.segments.len(),
            target_duration = ?manifest.target_duration,
            "Resolved rendition manifest"
        );
        Ok(manifest)
    }
}

pub fn parse_master(bytes: &[u8]) -> Result<MasterPlaylist, DownloadError> {
    let playlist = m3u8_rs::parse_master_playlist_res(bytes).map_err(|e| {
        DownloadError::Manifest(format!("Failed to parse master playlist: {e}"))
    })?;
    check_version(playlist.version, "master")?;
    Ok(playlist)
}

/// URI of the first rendition flagged `TYPE=AUDIO,DEFAULT=YES`.
pub fn select_audio_rendition(master: &MasterPlaylist) -> Result<&str, DownloadError> {
    master
        .alternatives
        .iter()
        .find(|m| m.media_type == AlternativeMediaType::Audio && m.default)
        .and_then(|m| m.uri.as_deref())
        .ok_or_else(|| {
            DownloadError::Manifest("Master playlist has no default audio rendition".to_string())
        })
}

pub fn parse_media(url: &Url, bytes: &[u8]) -> Result<RenditionManifest, DownloadError> {
    let playlist = m3u8_rs::parse_media_playlist_res(bytes).map_err(|e| {
        DownloadError::Manifest(format!("Failed to parse media playlist: {e}"))
    })?;
    let version = check_version(playlist.version, "media")?;
    let key = single_key(url, &playlist)?;

    let init_uri = playlist
        .segments
        .iter()
        .find_map(|s| s.map.as_ref())
        .map(|m| m.uri.as_str())
        .ok_or_else(|| {
            DownloadError::Manifest("Media playlist has no #EXT-X-MAP".to_string())
        })?;
    let init_segment = join(url, init_uri)?;

    let segments = playlist
        .segments
        .iter()
        .map(|s| join(url, &s.uri))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenditionManifest {
        url: url.clone(),
        version,
        key,
        init_segment,
        segments,
        target_duration: Some(playlist.target_duration).filter(|d| *d > 0),
    })
}

fn check_version(version: Option<usize>, which: &str) -> Result<usize, DownloadError> {
    match version {
        Some(SUPPORTED_VERSION) => Ok(SUPPORTED_VERSION),
        other => Err(DownloadError::Manifest(format!(
            "Unsupported {which} playlist version {other:?}, expected {SUPPORTED_VERSION}"
        ))),
    }
}

fn single_key(url: &Url, playlist: &MediaPlaylist) -> Result<KeyInfo, DownloadError> {
    let mut keys = playlist.segments.iter().filter_map(|s| s.key.as_ref());
    let (Some(key), None) = (keys.next(), keys.next()) else {
        return Err(DownloadError::Manifest(
            "Media playlist must declare exactly one #EXT-X-KEY".to_string(),
        ));
    };
    if key.method != KeyMethod::AES128 {
        return Err(DownloadError::Manifest(format!(
            "Unsupported encryption method: {:?}",
            key.method
        )));
    }
    let uri = key
        .uri
        .as_deref()
        .ok_or_else(|| DownloadError::Manifest("Key URI is missing".to_string()))?;
    let iv = key
        .iv
        .as_deref()
        .ok_or_else(|| DownloadError::Manifest("Key IV is missing".to_string()))?;
    Ok(KeyInfo {
        uri: join(url, uri)?,
        iv: parse_iv(iv)?,
    })
}

/// Parses a hex IV (optional `0x`) as a 128-bit number, left-padding short values.
pub fn parse_iv(text: &str) -> Result<[u8; 16], DownloadError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || digits.len() > 32 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DownloadError::Manifest(format!("Invalid IV '{text}'")));
    }
    let value = u128::from_str_radix(digits, 16)
        .map_err(|e| DownloadError::Manifest(format!("Invalid IV '{text}': {e}")))?;
    Ok(value.to_be_bytes())
}

fn join(base: &Url, uri: &str) -> Result<Url, DownloadError> {
    base.join(uri).map_err(|e| {
        DownloadError::Manifest(format!("Could not join {base} with URI {uri}: {e}"))
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hls::fetcher::testing::MockFetcher;

    pub const MASTER_URL: &str = "https://delivery.example.com/hls/master.m3u8?sig=abc";

    pub const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:6
#EXT-X-INDEPENDENT-SEGMENTS
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio-aac-64kbps\",NAME=\"Sub Audio\",DEFAULT=NO,URI=\"audio-aac-64kbps.m3u8\"
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio-aac-192kbps\",NAME=\"Main Audio\",DEFAULT=YES,URI=\"audio-aac-192kbps.m3u8\"
#EXT-X-STREAM-INF:BANDWIDTH=400000,AUDIO=\"audio-aac-192kbps\"
video-h264-144p.m3u8
";

    pub fn media_playlist(segments: usize, target_duration: u64) -> String {
        let mut text = format!(
            "#EXTM3U
#EXT-X-VERSION:6
#EXT-X-TARGETDURATION:{target_duration}
#EXT-X-MEDIA-SEQUENCE:1
#EXT-X-PLAYLIST-TYPE:VOD
#EXT-X-MAP:URI=\"init01.cmfa\"
#EXT-X-KEY:METHOD=AES-128,URI=\"https://keys.example.com/key?id=1\",IV=0x000102030405060708090a0b0c0d0e0f
"
        );
        for i in 1..=segments {
            text.push_str(&format!("#EXTINF:{target_duration}.0,\n{i:02}.cmfa\n"));
        }
        text.push_str("#EXT-X-ENDLIST\n");
        text
    }

    fn media_url() -> Url {
        Url::parse("https://delivery.example.com/hls/audio-aac-192kbps.m3u8").unwrap()
    }

    #[tokio::test]
    async fn test_resolve_selects_default_audio() {
        let fetcher = MockFetcher::new()
            .with(MASTER_URL, MASTER)
            .with(media_url().as_str(), media_playlist(3, 6))
            .into_arc();
        let resolver = ManifestResolver::new(fetcher.clone());

        let manifest = resolver.load(&Url::parse(MASTER_URL).unwrap()).await.unwrap();

        assert_eq!(manifest.url, media_url());
        assert_eq!(manifest.version, 6);
        assert_eq!(manifest.target_duration, Some(6));
        assert_eq!(
            manifest.init_segment.as_str(),
            "https://delivery.example.com/hls/init01.cmfa"
        );
        assert_eq!(manifest.segments.len(), 3);
        assert_eq!(
            manifest.segments[2].as_str(),
            "https://delivery.example.com/hls/03.cmfa"
        );
        assert_eq!(manifest.key.uri.as_str(), "https://keys.example.com/key?id=1");
        assert_eq!(
            manifest.key.iv,
            [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]
        );
        assert_eq!(fetcher.requested_count("https://delivery.example.com/"), 2);
    }

    #[test]
    fn test_master_without_default_audio_is_rejected() {
        let master = MASTER.replace("DEFAULT=YES", "DEFAULT=NO");
        let playlist = parse_master(master.as_bytes()).unwrap();
        assert!(matches!(
            select_audio_rendition(&playlist),
            Err(DownloadError::Manifest(_))
        ));
    }

    #[test]
    fn test_unsupported_version_is_rejected() {
        let master = MASTER.replace("#EXT-X-VERSION:6", "#EXT-X-VERSION:3");
        assert!(matches!(
            parse_master(master.as_bytes()),
            Err(DownloadError::Manifest(_))
        ));

        let media = media_playlist(2, 6).replace("#EXT-X-VERSION:6", "#EXT-X-VERSION:7");
        assert!(matches!(
            parse_media(&media_url(), media.as_bytes()),
            Err(DownloadError::Manifest(_))
        ));
    }

    #[test]
    fn test_key_method_and_iv_are_validated() {
        let media = media_playlist(2, 6).replace("METHOD=AES-128", "METHOD=SAMPLE-AES");
        assert!(matches!(
            parse_media(&media_url(), media.as_bytes()),
            Err(DownloadError::Manifest(_))
        ));

        let media = media_playlist(2, 6).replace(",IV=0x000102030405060708090a0b0c0d0e0f", "");
        assert!(matches!(
            parse_media(&media_url(), media.as_bytes()),
            Err(DownloadError::Manifest(_))
        ));
    }

    #[test]
    fn test_second_key_is_rejected() {
        let media = media_playlist(2, 6).replace(
            "#EXTINF:6.0,\n02.cmfa",
            "#EXT-X-KEY:METHOD=AES-128,URI=\"k2\",IV=0x01\n#EXTINF:6.0,\n02.cmfa",
        );
        assert!(matches!(
            parse_media(&media_url(), media.as_bytes()),
            Err(DownloadError::Manifest(_))
        ));
    }

    #[test]
    fn test_missing_target_duration_is_none() {
        let media = media_playlist(2, 6).replace("#EXT-X-TARGETDURATION:6\n", "");
        let manifest = parse_media(&media_url(), media.as_bytes()).unwrap();
        assert_eq!(manifest.target_duration, None);
    }

    #[test]
    fn test_parse_iv() {
        assert_eq!(parse_iv("0x01").unwrap()[15], 1);
        assert_eq!(parse_iv("0x01").unwrap()[..15], [0u8; 15]);
        assert_eq!(
            parse_iv("0XFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF").unwrap(),
            [0xff; 16]
        );
        assert!(parse_iv("0x1FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF").is_err());
        assert!(parse_iv("0xZZ").is_err());
        assert!(parse_iv("0x").is_err());
        assert!(parse_iv("+1").is_err());
    }
}
