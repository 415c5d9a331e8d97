//! The Drive REST client.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use gdsync_core::domain::{same_file_till_checksum, File};
use gdsync_core::ports::{About, Feature, RemoteClient, RemoteError, UploadSizeLimit, UpsertArgs};
use gdsync_core::util::{remote_root_like, root_like, round_to_second};
use gdsync_core::Context;

use crate::auth::Credentials;
use crate::mime::{mime_from_extension, DRIVE_FOLDER_MIME};

const API_BASE: &str = "https://www.googleapis.com/drive/v2";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v2";

/// Page size for child listings.
const LIST_PAGE_SIZE: u32 = 1000;

/// Granularity of bytes-transferred reports during downloads.
const PROGRESS_CHUNK: usize = 128 * 1024;

/// REST implementation of the remote port.
pub struct DriveClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: credentials.access_token,
            api_base: API_BASE.to_string(),
            upload_base: UPLOAD_BASE.to_string(),
        }
    }

    /// Builds a client from the credentials stored in a context's
    /// metadata directory.
    pub fn from_context(context: &Context) -> Result<Self, RemoteError> {
        let credentials = Credentials::load(&context.credentials_path())?;
        Ok(Self::new(credentials))
    }

    /// Overrides the service endpoints; for tests against a local stub.
    pub fn with_endpoints(mut self, api_base: String, upload_base: String) -> Self {
        self.api_base = api_base;
        self.upload_base = upload_base;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(http_err)?;
        decode_json(resp).await
    }

    /// Lists one page of children matching a query expression.
    async fn list_query(&self, q: String, page_token: Option<String>) -> Result<FileList, RemoteError> {
        let mut query = vec![
            ("q", q),
            ("maxResults", LIST_PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        self.get_json(format!("{}/files", self.api_base), &query).await
    }

    async fn root_file(&self) -> Result<File, RemoteError> {
        let dto: ApiFile = self
            .get_json(format!("{}/files/root", self.api_base), &[])
            .await?;
        Ok(dto.into_file())
    }

    /// Resolves one path segment under a parent id.
    async fn child_by_name(&self, parent_id: &str, name: &str) -> Result<File, RemoteError> {
        let q = format!(
            "'{}' in parents and title = '{}' and trashed=false",
            escape_query(parent_id),
            escape_query(name)
        );
        let page = self.list_query(q, None).await?;
        page.items
            .into_iter()
            .next()
            .map(ApiFile::into_file)
            .ok_or(RemoteError::PathNotExists)
    }

    /// Reads the blob for one upsert, from disk or stdin.
    async fn read_source(&self, args: &UpsertArgs, src: &File) -> Result<Vec<u8>, RemoteError> {
        if args.non_statable {
            use tokio::io::AsyncReadExt;
            let mut data = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut data)
                .await
                .map_err(|err| RemoteError::Api(format!("reading stdin: {err}")))?;
            return Ok(data);
        }

        let path = if !args.fs_abs_path.is_empty() {
            args.fs_abs_path.clone()
        } else {
            src.blob_at.clone()
        };
        tokio::fs::read(&path)
            .await
            .map_err(|err| RemoteError::Api(format!("reading {path}: {err}")))
    }

    fn resolve_mime(&self, args: &UpsertArgs, src: &File) -> String {
        if src.is_dir {
            return DRIVE_FOLDER_MIME.to_string();
        }
        if let Some(key) = &args.mime_key {
            if let Some(mime) = mime_from_extension(key) {
                return mime.to_string();
            }
        }
        if !src.mime_type.is_empty() {
            return src.mime_type.clone();
        }
        "application/octet-stream".to_string()
    }
}

#[async_trait::async_trait]
impl RemoteClient for DriveClient {
    async fn find_by_path(&self, path: &str) -> Result<File, RemoteError> {
        if root_like(path) {
            return self.root_file().await;
        }

        // A leading "My Drive" segment is another spelling of the root.
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.first().is_some_and(|s| remote_root_like(s)) {
            segments.remove(0);
        }

        let mut current = self.root_file().await?;
        for segment in segments {
            current = self.child_by_name(&current.id, segment).await?;
        }
        Ok(current)
    }

    async fn find_by_parent_id(
        &self,
        parent_id: &str,
        include_hidden: bool,
    ) -> Result<Vec<File>, RemoteError> {
        let q = format!("'{}' in parents and trashed=false", escape_query(parent_id));

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_query(q.clone(), page_token).await?;
            for item in page.items {
                let file = item.into_file();
                if !include_hidden && file.name.starts_with('.') {
                    continue;
                }
                files.push(file);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(files)
    }

    async fn find_matches(
        &self,
        base_path: &str,
        patterns: &[String],
        in_trash: bool,
    ) -> Result<Vec<File>, RemoteError> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }
        let base = self.find_by_path(base_path).await?;

        let clauses: Vec<String> = patterns
            .iter()
            .map(|p| format!("title contains '{}'", escape_query(p)))
            .collect();
        let q = format!(
            "'{}' in parents and ({}) and trashed={}",
            escape_query(&base.id),
            clauses.join(" or "),
            in_trash
        );

        let page = self.list_query(q, None).await?;
        Ok(page.items.into_iter().map(ApiFile::into_file).collect())
    }

    async fn upsert_by_comparison(&self, args: &UpsertArgs) -> Result<Option<File>, RemoteError> {
        let src = args
            .src
            .as_ref()
            .ok_or_else(|| RemoteError::Api("upsert without a source".to_string()))?;

        // Send nothing when the destination already agrees.
        if let Some(dest) = &args.dest {
            if !src.is_dir
                && !args.non_statable
                && same_file_till_checksum(src, dest, args.ignore_checksum)
            {
                debug!(name = %src.name, "destination is current, skipping upload");
                return Ok(None);
            }
        }

        let mime_type = self.resolve_mime(args, src);
        let mod_time = src.mod_time.to_rfc3339_opts(SecondsFormat::Millis, true);
        let metadata = json!({
            "title": src.name,
            "mimeType": mime_type,
            "modifiedDate": mod_time,
            "parents": [{"id": args.parent_id}],
        });

        let existing_id = args
            .dest
            .as_ref()
            .map(|d| d.id.clone())
            .filter(|id| !id.is_empty())
            .or_else(|| Some(src.id.clone()).filter(|id| !id.is_empty()));

        // Step 1: create or update the entry's metadata.
        let entry: ApiFile = match &existing_id {
            Some(id) => {
                let resp = self
                    .http
                    .put(format!("{}/files/{}", self.api_base, id))
                    .bearer_auth(&self.token)
                    .query(&[("setModifiedDate", "true")])
                    .json(&metadata)
                    .send()
                    .await
                    .map_err(http_err)?;
                decode_json(resp).await?
            }
            None => {
                let resp = self
                    .http
                    .post(format!("{}/files", self.api_base))
                    .bearer_auth(&self.token)
                    .json(&metadata)
                    .send()
                    .await
                    .map_err(http_err)?;
                decode_json(resp).await?
            }
        };

        if src.is_dir {
            return Ok(Some(entry.into_file()));
        }

        // Step 2: replace the content.
        let data = self.read_source(args, src).await?;
        let sent = data.len() as u64;
        let resp = self
            .http
            .put(format!("{}/files/{}", self.upload_base, entry.id))
            .bearer_auth(&self.token)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(data)
            .send()
            .await
            .map_err(http_err)?;
        let _uploaded: ApiFile = decode_json(resp).await?;

        if let Some(tx) = &args.progress {
            let _ = tx.send(sent).await;
        }

        // Step 3: the media upload stamped "now"; re-pin the source's
        // modification time so both sides agree.
        let resp = self
            .http
            .put(format!("{}/files/{}", self.api_base, entry.id))
            .bearer_auth(&self.token)
            .query(&[("setModifiedDate", "true")])
            .json(&json!({ "modifiedDate": mod_time }))
            .send()
            .await
            .map_err(http_err)?;
        let finalized: ApiFile = decode_json(resp).await?;

        Ok(Some(finalized.into_file()))
    }

    async fn download(
        &self,
        file: &File,
        progress: Option<tokio::sync::mpsc::Sender<u64>>,
    ) -> Result<Vec<u8>, RemoteError> {
        if file.has_export_links() {
            return Err(RemoteError::Api(format!(
                "'{}' has no raw content; only format exports",
                file.name
            )));
        }

        let url = if !file.blob_at.is_empty() {
            file.blob_at.clone()
        } else {
            format!("{}/files/{}?alt=media", self.api_base, file.id)
        };

        let mut resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(http_err)?;
        if !resp.status().is_success() {
            return Err(status_err(resp).await);
        }

        let mut data = Vec::with_capacity(file.size as usize);
        let mut unreported = 0usize;
        while let Some(chunk) = resp.chunk().await.map_err(http_err)? {
            unreported += chunk.len();
            data.extend_from_slice(&chunk);
            if unreported >= PROGRESS_CHUNK {
                if let Some(tx) = &progress {
                    let _ = tx.send(unreported as u64).await;
                }
                unreported = 0;
            }
        }
        if unreported > 0 {
            if let Some(tx) = &progress {
                let _ = tx.send(unreported as u64).await;
            }
        }
        Ok(data)
    }

    async fn trash(&self, id: &str) -> Result<(), RemoteError> {
        let resp = self
            .http
            .post(format!("{}/files/{}/trash", self.api_base, id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(http_err)?;
        expect_success(resp).await
    }

    async fn untrash(&self, id: &str) -> Result<(), RemoteError> {
        let resp = self
            .http
            .post(format!("{}/files/{}/untrash", self.api_base, id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(http_err)?;
        expect_success(resp).await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let resp = self
            .http
            .delete(format!("{}/files/{}", self.api_base, id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(http_err)?;
        expect_success(resp).await
    }

    async fn about(&self) -> Result<About, RemoteError> {
        let dto: AboutDto = self
            .get_json(format!("{}/about", self.api_base), &[])
            .await?;
        Ok(dto.into_about())
    }
}

// ============================================================================
// Wire DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    items: Vec<ApiFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFile {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    modified_date: String,
    /// int64 carried as a decimal string on the wire.
    #[serde(default)]
    file_size: Option<String>,
    #[serde(default)]
    md5_checksum: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    export_links: Option<HashMap<String, String>>,
    #[serde(default)]
    etag: String,
    /// int64 carried as a decimal string on the wire.
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    alternate_link: Option<String>,
    #[serde(default)]
    owner_names: Option<Vec<String>>,
    #[serde(default)]
    shared: bool,
}

impl ApiFile {
    fn into_file(self) -> File {
        let mod_time = DateTime::parse_from_rfc3339(&self.modified_date)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(DateTime::UNIX_EPOCH);
        File {
            is_dir: self.mime_type == DRIVE_FOLDER_MIME,
            id: self.id,
            name: decode_percent(&self.title),
            size: self
                .file_size
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            mod_time: round_to_second(mod_time),
            md5_checksum: self.md5_checksum.unwrap_or_default(),
            mime_type: self.mime_type,
            blob_at: self.download_url.unwrap_or_default(),
            export_links: self.export_links.unwrap_or_default(),
            etag: self.etag,
            version: self
                .version
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            alternate_link: self.alternate_link.unwrap_or_default(),
            owner_names: self.owner_names.unwrap_or_default(),
            shared: self.shared,
            ..File::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    quota_bytes_total: Option<String>,
    #[serde(default)]
    quota_bytes_used: Option<String>,
    #[serde(default)]
    quota_bytes_used_in_trash: Option<String>,
    #[serde(default)]
    features: Vec<FeatureDto>,
    #[serde(default)]
    max_upload_sizes: Vec<UploadSizeDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureDto {
    #[serde(default)]
    feature_name: String,
    #[serde(default)]
    feature_rate: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSizeDto {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    size: Option<String>,
}

impl AboutDto {
    fn into_about(self) -> About {
        About {
            name: self.name,
            quota_bytes_total: parse_u64(self.quota_bytes_total),
            quota_bytes_used: parse_u64(self.quota_bytes_used),
            quota_bytes_used_in_trash: parse_u64(self.quota_bytes_used_in_trash),
            features: self
                .features
                .into_iter()
                .map(|f| Feature {
                    name: f.feature_name,
                    rate: f.feature_rate,
                })
                .collect(),
            max_upload_sizes: self
                .max_upload_sizes
                .into_iter()
                .map(|u| UploadSizeLimit {
                    kind: u.kind,
                    size: parse_u64(u.size),
                })
                .collect(),
        }
    }
}

fn parse_u64(value: Option<String>) -> u64 {
    value.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0)
}

// ============================================================================
// Helpers
// ============================================================================

fn http_err(err: reqwest::Error) -> RemoteError {
    RemoteError::Http(err.to_string())
}

async fn status_err(resp: reqwest::Response) -> RemoteError {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return RemoteError::PathNotExists;
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return RemoteError::Auth("access token rejected".to_string());
    }
    let body = resp.text().await.unwrap_or_default();
    warn!(%status, "remote request failed");
    RemoteError::Api(format!("{status}: {body}"))
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, RemoteError> {
    if !resp.status().is_success() {
        return Err(status_err(resp).await);
    }
    resp.json::<T>()
        .await
        .map_err(|err| RemoteError::Api(format!("malformed response: {err}")))
}

async fn expect_success(resp: reqwest::Response) -> Result<(), RemoteError> {
    if !resp.status().is_success() {
        return Err(status_err(resp).await);
    }
    Ok(())
}

/// Escapes a value for embedding in a Drive query expression.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Decodes percent-escapes left in remote titles so names match the
/// filesystem spelling. Malformed escapes pass through literally.
fn decode_percent(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            let hex = [bytes[i + 1], bytes[i + 2]];
            if let Ok(byte) = u8::from_str_radix(std::str::from_utf8(&hex).unwrap_or(""), 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| s.to_string())
}
