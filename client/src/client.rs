use std::time::Duration;

use log::warn;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use filebank_proto::wire::{
    AddNodeRequest, AddNodeResponse, DownloadRequest, ErrorBody, FileAndProofResponse,
    MerkleRootResponse, OpenReply, UploadCommitRequest, UploadFileRequest, UploadInitRequest,
};
use filebank_proto::BankError;
use filebank_storage::BankHome;

/// Wire-level client for one remote node. When the home carries a CA
/// certificate the connection is HTTPS pinned to that CA; otherwise it falls
/// back to plaintext, which is logged.
pub struct NodeClient {
    client: Client,
    base_url: String,
}

impl NodeClient {
    pub fn connect(home: &BankHome, host: &str, timeout_secs: u64) -> Result<Self, BankError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(timeout_secs));

        let ca_path = home.ca_cert_path();
        let base_url = if ca_path.is_file() {
            let ca = std::fs::read(&ca_path).map_err(|e| BankError::Internal(e.to_string()))?;
            let certificate = reqwest::Certificate::from_pem(&ca)
                .map_err(|e| BankError::Malformed(format!("unreadable CA certificate: {e}")))?;
            builder = builder.add_root_certificate(certificate);
            format!("https://{host}")
        } else {
            warn!(
                "no CA certificate at {}, using plaintext transport",
                ca_path.display()
            );
            format!("http://{host}")
        };

        let client = builder
            .build()
            .map_err(|e| BankError::Internal(e.to_string()))?;
        Ok(NodeClient { client, base_url })
    }

    pub async fn add_node(&self, req: &AddNodeRequest) -> Result<AddNodeResponse, BankError> {
        self.post("/v1/addnode", req).await
    }

    pub async fn upload_open(&self) -> Result<OpenReply, BankError> {
        self.post_empty("/v1/upload/open").await
    }

    pub async fn upload_init(&self, req: &UploadInitRequest) -> Result<String, BankError> {
        self.post("/v1/upload/init", req).await
    }

    pub async fn upload_file(&self, req: &UploadFileRequest) -> Result<String, BankError> {
        self.post("/v1/upload/file", req).await
    }

    pub async fn upload_commit(
        &self,
        req: &UploadCommitRequest,
    ) -> Result<MerkleRootResponse, BankError> {
        self.post("/v1/upload/commit", req).await
    }

    pub async fn download_open(&self) -> Result<OpenReply, BankError> {
        self.post_empty("/v1/download/open").await
    }

    pub async fn download(&self, req: &DownloadRequest) -> Result<FileAndProofResponse, BankError> {
        self.post("/v1/download", req).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BankError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| BankError::Transport(e.to_string()))?;
        Self::parse(response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, BankError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| BankError::Transport(e.to_string()))?;
        Self::parse(response).await
    }

    /// A failed request carries the peer's typed error kind in its body; it
    /// is rebuilt here so callers see the same `BankError` on both sides.
    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BankError> {
        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| BankError::Malformed(format!("invalid response body: {e}")))
        } else {
            match response.json::<ErrorBody>().await {
                Ok(body) => Err(body.into_error()),
                Err(_) => Err(BankError::Transport(format!(
                    "request failed with status {status}"
                ))),
            }
        }
    }
}
