use std::sync::Arc;

use log::{info, warn};
use merkle::MerkleTree;
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{json, Reply, Response};
use warp::Rejection;

use filebank_crypto::ed25519::{bank_address, import_public_key_pem, verify_signature};
use filebank_proto::descriptor::ServerBankDescriptor;
use filebank_proto::messages::{
    sign_bytes, SignAddNodeServer, SignDownloadRequestClient, SignMerkleRootServer,
    SignUploadRequestClient,
};
use filebank_proto::wire::{
    decode_array, decode_bytes, encode_bytes, AddNodeRequest, AddNodeResponse, DownloadRequest,
    ErrorBody, FileAndProofResponse, MerkleRootResponse, OpenReply, UploadCommitRequest,
    UploadFileRequest, UploadInitRequest,
};
use filebank_proto::BankError;

use crate::context::ServerContext;
use crate::session::SessionState;

type Result<T> = std::result::Result<T, Rejection>;

pub struct Handler {
    ctx: Arc<ServerContext>,
}

impl Handler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Handler { ctx }
    }

    pub async fn add_node(&self, req: AddNodeRequest) -> Result<impl Reply> {
        Ok(respond(self.add_node_inner(req)))
    }

    pub async fn upload_open(&self) -> Result<impl Reply> {
        let nonce = self.ctx.sessions().open(SessionState::UploadAwaitInit);
        Ok(respond(Ok(OpenReply {
            nonce: encode_bytes(&nonce),
        })))
    }

    pub async fn upload_init(&self, req: UploadInitRequest) -> Result<impl Reply> {
        Ok(respond(self.upload_init_inner(req)))
    }

    pub async fn upload_file(&self, req: UploadFileRequest) -> Result<impl Reply> {
        Ok(respond(self.upload_file_inner(req)))
    }

    pub async fn upload_commit(&self, req: UploadCommitRequest) -> Result<impl Reply> {
        Ok(respond(self.upload_commit_inner(req)))
    }

    pub async fn download_open(&self) -> Result<impl Reply> {
        let nonce = self.ctx.sessions().open(SessionState::DownloadAwaitRequest);
        Ok(respond(Ok(OpenReply {
            nonce: encode_bytes(&nonce),
        })))
    }

    pub async fn download(&self, req: DownloadRequest) -> Result<impl Reply> {
        Ok(respond(self.download_inner(req)))
    }

    /// Single round-trip introduction: echo the client's nonce and present
    /// the server public key, signed so the client can pin it.
    fn add_node_inner(&self, req: AddNodeRequest) -> std::result::Result<AddNodeResponse, BankError> {
        let nonce: [u8; 12] = decode_array(&req.nonce)?;

        let shape = SignAddNodeServer {
            nonce,
            pub_key_pem: self.ctx.pub_key_pem().to_string(),
        };
        let signature = self.ctx.sign(&sign_bytes(&shape)?);

        info!("introduced server identity to a new client");
        Ok(AddNodeResponse {
            nonce: req.nonce,
            pub_key: self.ctx.pub_key_pem().to_string(),
            signature: encode_bytes(&signature),
        })
    }

    fn upload_init_inner(&self, req: UploadInitRequest) -> std::result::Result<&'static str, BankError> {
        let nonce: [u8; 12] = decode_array(&req.nonce)?;
        let session = self.ctx.sessions().take(&nonce)?;
        if !matches!(session.state, SessionState::UploadAwaitInit) {
            return Err(BankError::Malformed(
                "message does not match session phase".to_string(),
            ));
        }

        let pub_key = import_public_key_pem(&req.pub_key)?;
        if req.nb_files < 1 {
            return Err(BankError::Malformed("nbFiles must be at least 1".to_string()));
        }
        let signature: [u8; 64] = decode_array(&req.signature)?;
        let shape = SignUploadRequestClient {
            nonce,
            pub_key_pem: req.pub_key.clone(),
            nb_files: req.nb_files,
        };
        verify_signature(&pub_key, &sign_bytes(&shape)?, &signature)?;

        let bank_id = bank_address(&req.pub_key);
        if self.ctx.home().server_bank_exists(&bank_id) {
            return Err(BankError::AlreadyExists(format!("bank {bank_id}")));
        }

        self.ctx.sessions().restore(
            nonce,
            session.advance(SessionState::UploadReceiving {
                pub_key_pem: req.pub_key,
                nb_files: req.nb_files as u32,
                next_seq: 1,
                files: Vec::new(),
            }),
        );
        Ok("ok")
    }

    fn upload_file_inner(&self, req: UploadFileRequest) -> std::result::Result<&'static str, BankError> {
        let nonce: [u8; 12] = decode_array(&req.nonce)?;
        let mut session = self.ctx.sessions().take(&nonce)?;

        let SessionState::UploadReceiving {
            nb_files,
            next_seq,
            files,
            ..
        } = &mut session.state
        else {
            return Err(BankError::Malformed(
                "message does not match session phase".to_string(),
            ));
        };

        // strictly increasing 1..N; anything else aborts the exchange
        if req.seq != *next_seq {
            return Err(BankError::OrderViolation(format!(
                "expected seq {}, got {}",
                next_seq, req.seq
            )));
        }
        if files.len() as u32 >= *nb_files {
            return Err(BankError::OrderViolation(format!(
                "received more than {nb_files} files"
            )));
        }

        files.push(decode_bytes(&req.content)?);
        *next_seq += 1;

        self.ctx.sessions().restore(nonce, session);
        Ok("ok")
    }

    /// Terminal upload step: rebuild the tree from what was actually
    /// received, persist the bank, and attest the root under the client's
    /// closing nonce.
    fn upload_commit_inner(
        &self,
        req: UploadCommitRequest,
    ) -> std::result::Result<MerkleRootResponse, BankError> {
        let nonce: [u8; 12] = decode_array(&req.nonce)?;
        let session = self.ctx.sessions().take(&nonce)?;

        let SessionState::UploadReceiving {
            pub_key_pem,
            nb_files,
            files,
            ..
        } = session.state
        else {
            return Err(BankError::Malformed(
                "message does not match session phase".to_string(),
            ));
        };
        if files.len() as u32 != nb_files {
            return Err(BankError::Malformed(format!(
                "received {} of {} files",
                files.len(),
                nb_files
            )));
        }
        let client_nonce: [u8; 12] = decode_array(&req.client_nonce)?;

        let tree = MerkleTree::build(&files).map_err(|e| BankError::Internal(e.to_string()))?;
        let descriptor = ServerBankDescriptor {
            pub_key_pem,
            nb_files,
            tree: tree.hashes().to_vec(),
        };
        self.ctx.home().server_write_bank(&descriptor, &files)?;

        let root = tree.root();
        let shape = SignMerkleRootServer {
            nonce: client_nonce,
            merkle_root: root,
        };
        let signature = self.ctx.sign(&sign_bytes(&shape)?);

        info!(
            "created bank {} with {} files",
            bank_address(&descriptor.pub_key_pem),
            nb_files
        );
        Ok(MerkleRootResponse {
            nonce: req.client_nonce,
            merkle_root: encode_bytes(&root),
            signature: encode_bytes(&signature),
        })
    }

    /// All checks run before any file byte is emitted: session nonce, bank
    /// existence, request signature under the stored bank key, file range.
    fn download_inner(
        &self,
        req: DownloadRequest,
    ) -> std::result::Result<FileAndProofResponse, BankError> {
        let nonce: [u8; 12] = decode_array(&req.nonce)?;
        let session = self.ctx.sessions().take(&nonce)?;
        if !matches!(session.state, SessionState::DownloadAwaitRequest) {
            return Err(BankError::Malformed(
                "message does not match session phase".to_string(),
            ));
        }

        if !self.ctx.home().server_bank_exists(&req.pub_key_addr) {
            return Err(BankError::NotFoundLocal(format!("bank {}", req.pub_key_addr)));
        }
        let descriptor = self.ctx.home().server_bank_descriptor(&req.pub_key_addr)?;

        let pub_key = import_public_key_pem(&descriptor.pub_key_pem)?;
        let signature: [u8; 64] = decode_array(&req.signature)?;
        let shape = SignDownloadRequestClient {
            nonce,
            pub_key_addr_b58: req.pub_key_addr.clone(),
            file_num: req.file_num,
        };
        verify_signature(&pub_key, &sign_bytes(&shape)?, &signature)?;

        if req.file_num < 1 || req.file_num as u32 > descriptor.nb_files {
            return Err(BankError::OutOfRange(format!(
                "file number {} outside 1..={}",
                req.file_num, descriptor.nb_files
            )));
        }

        let file = self
            .ctx
            .home()
            .server_bank_file(&req.pub_key_addr, req.file_num as u32)?;
        let tree = MerkleTree::from_hashes(descriptor.tree)
            .map_err(|_| BankError::Malformed("stored merkle tree is malformed".to_string()))?;
        let proof = tree.proof_for_file(&file).map_err(|_| {
            BankError::Internal("stored ciphertext no longer matches bank tree".to_string())
        })?;

        Ok(FileAndProofResponse {
            proof: encode_bytes(&proof.to_linear()),
            file: encode_bytes(&file),
        })
    }
}

/// Map a handler outcome onto a reply: 200 with the body, or the error kind
/// as a JSON body under the matching status code.
fn respond<T: Serialize>(result: std::result::Result<T, BankError>) -> Response {
    match result {
        Ok(body) => json(&body).into_response(),
        Err(err) => {
            warn!("request failed: {err}");
            warp::reply::with_status(json(&ErrorBody::from_error(&err)), status_for(&err))
                .into_response()
        }
    }
}

fn status_for(err: &BankError) -> StatusCode {
    match err {
        BankError::NotFoundLocal(_) => StatusCode::NOT_FOUND,
        BankError::AlreadyExists(_) => StatusCode::CONFLICT,
        BankError::Internal(_) | BankError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}
