use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use tracing::debug;

use crate::config::DriveConfig;
use crate::error::{DriveFsError, Result};
use crate::remote::{
    DriveApi, FileList, ListRequest, NewNode, NodePatch, RemoteNode, Upload, NODE_FIELDS,
};

/// Drive v3 REST client authenticated with an API key.
pub struct HttpDriveClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    upload_base: String,
}

impl HttpDriveClient {
    pub fn new(config: &DriveConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.application_name.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            upload_base: config.upload_base.clone(),
        })
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.api_base)
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/files/{id}", self.api_base)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .query(&[("key", self.api_key.as_str())])
    }

    /// Multipart create or update: metadata and media in one request.
    fn upload_request<T: Serialize>(
        &self,
        method: Method,
        url: String,
        metadata: &T,
        upload: Upload,
    ) -> Result<RequestBuilder> {
        let (content_type, body) = multipart_related(metadata, upload)?;
        let content_type = HeaderValue::from_str(&content_type).map_err(|e| {
            DriveFsError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        Ok(self
            .request(method, url)
            .query(&[("uploadType", "multipart"), ("fields", NODE_FIELDS)])
            .header(CONTENT_TYPE, content_type)
            .body(body))
    }
}

/// Turn non-2xx responses into [`DriveFsError::Api`].
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(DriveFsError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Build a `multipart/related` body: JSON metadata part, then the media part.
fn multipart_related<T: Serialize>(metadata: &T, upload: Upload) -> Result<(String, Vec<u8>)> {
    let json = serde_json::to_vec(metadata)?;
    let boundary = format!("drivefs-{:x}", md5::compute(&upload.content));

    let mut body = Vec::with_capacity(json.len() + upload.content.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(&json);
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", upload.mime_type).as_bytes());
    body.extend_from_slice(&upload.content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Ok((format!("multipart/related; boundary={boundary}"), body))
}

#[async_trait]
impl DriveApi for HttpDriveClient {
    async fn list(&self, request: &ListRequest) -> Result<FileList> {
        let mut params: Vec<(&str, String)> = vec![("fields", request.fields.clone())];
        if !request.query.is_empty() {
            params.push(("q", request.query.to_string()));
        }
        if let Some(size) = request.page_size {
            params.push(("pageSize", size.to_string()));
        }
        if let Some(token) = &request.page_token {
            params.push(("pageToken", token.clone()));
        }

        debug!(q = %request.query, page_token = ?request.page_token, "files.list");
        let resp = self
            .request(Method::GET, self.files_url())
            .query(&params)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn get(&self, id: &str) -> Result<RemoteNode> {
        debug!(id, "files.get");
        let resp = self
            .request(Method::GET, self.file_url(id))
            .query(&[("fields", NODE_FIELDS)])
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        debug!(id, "files.get alt=media");
        let resp = self
            .request(Method::GET, self.file_url(id))
            .query(&[("alt", "media")])
            .send()
            .await?;
        Ok(check(resp).await?.bytes().await?.to_vec())
    }

    async fn create(&self, node: &NewNode, upload: Option<Upload>) -> Result<RemoteNode> {
        debug!(name = %node.name, mime = %node.mime_type, "files.create");
        let request = match upload {
            Some(upload) => self.upload_request(
                Method::POST,
                format!("{}/files", self.upload_base),
                node,
                upload,
            )?,
            None => self
                .request(Method::POST, self.files_url())
                .query(&[("fields", NODE_FIELDS)])
                .json(node),
        };
        let resp = request.send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn update(
        &self,
        id: &str,
        patch: &NodePatch,
        upload: Option<Upload>,
    ) -> Result<RemoteNode> {
        debug!(
            id,
            name = ?patch.name,
            add_parents = ?patch.add_parents,
            remove_parents = ?patch.remove_parents,
            "files.update"
        );
        let mut request = match upload {
            Some(upload) => self.upload_request(
                Method::PATCH,
                format!("{}/files/{id}", self.upload_base),
                patch,
                upload,
            )?,
            None => self
                .request(Method::PATCH, self.file_url(id))
                .query(&[("fields", NODE_FIELDS)])
                .json(patch),
        };
        if let Some(parent) = &patch.add_parents {
            request = request.query(&[("addParents", parent)]);
        }
        if let Some(parent) = &patch.remove_parents {
            request = request.query(&[("removeParents", parent)]);
        }
        let resp = request.send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        debug!(id, "files.delete");
        let resp = self.request(Method::DELETE, self.file_url(id)).send().await?;
        check(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpDriveClient {
        let cfg = DriveConfig::builder("test-key", "drivefs-tests")
            .unwrap()
            .api_base("http://127.0.0.1:9/drive/v3")
            .upload_base("http://127.0.0.1:9/upload/drive/v3")
            .build();
        HttpDriveClient::new(&cfg).unwrap()
    }

    #[test]
    fn urls() {
        let c = client();
        assert_eq!(c.files_url(), "http://127.0.0.1:9/drive/v3/files");
        assert_eq!(c.file_url("abc"), "http://127.0.0.1:9/drive/v3/files/abc");
    }

    #[test]
    fn request_carries_api_key() {
        let c = client();
        let req = c
            .request(Method::GET, c.file_url("abc"))
            .query(&[("alt", "media")])
            .build()
            .unwrap();
        assert_eq!(req.url().query(), Some("key=test-key&alt=media"));
    }

    #[test]
    fn multipart_body_layout() {
        let node = NewNode {
            name: "b.txt".into(),
            mime_type: "text/plain".into(),
            parents: vec!["p1".into()],
        };
        let upload = Upload {
            mime_type: "text/plain".into(),
            content: b"hi".to_vec(),
        };
        let (content_type, body) = multipart_related(&node, upload).unwrap();
        let boundary = format!("drivefs-{:x}", md5::compute(b"hi"));
        assert_eq!(content_type, format!("multipart/related; boundary={boundary}"));

        let text = String::from_utf8(body).unwrap();
        let expected = format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n\
             {{\"name\":\"b.txt\",\"mimeType\":\"text/plain\",\"parents\":[\"p1\"]}}\
             \r\n--{boundary}\r\nContent-Type: text/plain\r\n\r\nhi\r\n--{boundary}--\r\n"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn upload_request_headers() {
        let c = client();
        let patch = NodePatch {
            name: Some("x.txt".into()),
            ..NodePatch::default()
        };
        let upload = Upload {
            mime_type: "text/plain".into(),
            content: b"data".to_vec(),
        };
        let req = c
            .upload_request(
                Method::PATCH,
                format!("{}/files/abc", c.upload_base),
                &patch,
                upload,
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(req.method(), &Method::PATCH);
        assert!(req.url().as_str().contains("uploadType=multipart"));
        let ct = req.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(ct.starts_with("multipart/related; boundary=drivefs-"));
    }
}
