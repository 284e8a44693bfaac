//! xBrowserSync REST transport.
//!
//! | call          | request                              | response                              |
//! |---------------|--------------------------------------|---------------------------------------|
//! | fetch         | `GET bookmarks/{id}`                 | `{bookmarks, lastUpdated, version}`   |
//! | push          | `PUT bookmarks/{id}` `{bookmarks, lastUpdated}` | `{lastUpdated}`            |
//! | last updated  | `GET bookmarks/{id}/lastUpdated`     | `{lastUpdated}`                       |
//! | sync version  | `GET bookmarks/{id}/version`         | `{version}`                           |

use super::transport::{RemoteBlob, Transport, VersionToken};
use crate::config::SyncConfig;
use crate::error::{SyncResult, TransportError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetBookmarksRes {
    #[serde(default)]
    bookmarks: String,
    last_updated: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBookmarksReq<'a> {
    bookmarks: &'a str,
    last_updated: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastUpdatedRes {
    last_updated: String,
}

#[derive(Debug, Deserialize)]
struct VersionRes {
    version: String,
}

pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let base_url = config.base_url()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(format!("marksync/{}", config.client_version))
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { client, base_url })
    }

    /// `{base}/bookmarks/{sync_id}[/{tail}]`, keeping any path prefix of the base.
    fn endpoint(&self, sync_id: &str, tail: Option<&str>) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| TransportError::Protocol(format!("base url cannot hold a path: {}", self.base_url)))?;
            segments.pop_if_empty().push("bookmarks").push(sync_id);
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, TransportError> {
        debug!(%url, "GET");
        let resp = self.client.get(url).send().await?;
        read_json(resp).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_blob(&self, sync_id: &str) -> Result<RemoteBlob, TransportError> {
        let res: GetBookmarksRes = self.get_json(self.endpoint(sync_id, None)?).await?;
        Ok(RemoteBlob {
            ciphertext: res.bookmarks,
            version: VersionToken(res.last_updated),
            client_version: res.version,
        })
    }

    async fn push_blob(
        &self,
        sync_id: &str,
        ciphertext: &str,
        version: &VersionToken,
    ) -> Result<VersionToken, TransportError> {
        let url = self.endpoint(sync_id, None)?;
        debug!(%url, bytes = ciphertext.len(), "PUT");
        let body = UpdateBookmarksReq { bookmarks: ciphertext, last_updated: &version.0 };
        let resp = self.client.put(url).json(&body).send().await?;
        let res: LastUpdatedRes = read_json(resp).await?;
        Ok(VersionToken(res.last_updated))
    }

    async fn last_updated(&self, sync_id: &str) -> Result<VersionToken, TransportError> {
        let res: LastUpdatedRes = self.get_json(self.endpoint(sync_id, Some("lastUpdated"))?).await?;
        Ok(VersionToken(res.last_updated))
    }

    async fn sync_version(&self, sync_id: &str) -> Result<String, TransportError> {
        let res: VersionRes = self.get_json(self.endpoint(sync_id, Some("version"))?).await?;
        Ok(res.version)
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, TransportError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(status_error(status, body));
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Protocol(format!("json: {}", e)))
}

fn status_error(status: StatusCode, body: String) -> TransportError {
    match status {
        StatusCode::CONFLICT => TransportError::VersionConflict,
        StatusCode::NOT_FOUND => TransportError::NotFound,
        _ => {
            warn!(status = status.as_u16(), "sync service error");
            TransportError::Status { status: status.as_u16(), body }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        let config = SyncConfig { base_url: base.to_string(), ..SyncConfig::default() };
        HttpTransport::new(&config).unwrap()
    }

    #[test]
    fn endpoints() {
        let t = transport("https://api.xbrowsersync.org");
        assert_eq!(t.endpoint("abc", None).unwrap().as_str(), "https://api.xbrowsersync.org/bookmarks/abc");
        assert_eq!(
            t.endpoint("abc", Some("lastUpdated")).unwrap().as_str(),
            "https://api.xbrowsersync.org/bookmarks/abc/lastUpdated"
        );
    }

    #[test]
    fn endpoints_keep_prefix() {
        let with_slash = transport("https://sync.example.org/api/");
        let without = transport("https://sync.example.org/api");
        let expected = "https://sync.example.org/api/bookmarks/abc/version";
        assert_eq!(with_slash.endpoint("abc", Some("version")).unwrap().as_str(), expected);
        assert_eq!(without.endpoint("abc", Some("version")).unwrap().as_str(), expected);
    }

    #[test]
    fn sync_id_is_escaped() {
        let t = transport("https://api.xbrowsersync.org/");
        let url = t.endpoint("../admin", None).unwrap();
        assert_eq!(url.path(), "/bookmarks/..%2Fadmin");
    }

    #[test]
    fn bad_base_url_is_config_error() {
        let config = SyncConfig { base_url: "no scheme".into(), ..SyncConfig::default() };
        assert!(matches!(HttpTransport::new(&config), Err(crate::error::SyncError::Config(_))));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(status_error(StatusCode::CONFLICT, String::new()), TransportError::VersionConflict));
        assert!(matches!(status_error(StatusCode::NOT_FOUND, String::new()), TransportError::NotFound));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "down".into()),
            TransportError::Status { status: 503, ref body } if body == "down"
        ));
    }

    #[test]
    fn response_shapes() {
        let res: GetBookmarksRes = serde_json::from_str(
            r#"{"bookmarks":"abc=","lastUpdated":"2024-01-01T00:00:00.000Z","version":"1.1.13"}"#,
        )
        .unwrap();
        assert_eq!(res.bookmarks, "abc=");
        assert_eq!(res.last_updated, "2024-01-01T00:00:00.000Z");

        // freshly created sync: no blob yet
        let res: GetBookmarksRes = serde_json::from_str(r#"{"lastUpdated":"2024-01-01T00:00:00.000Z"}"#).unwrap();
        assert!(res.bookmarks.is_empty());

        let body = serde_json::to_value(UpdateBookmarksReq { bookmarks: "x", last_updated: "t" }).unwrap();
        assert_eq!(body, serde_json::json!({ "bookmarks": "x", "lastUpdated": "t" }));
    }
}
