pub mod context;
pub mod handler;
pub mod session;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use warp::body::json;
use warp::{Filter, Rejection, Reply};

use filebank_proto::wire::{
    AddNodeRequest, DownloadRequest, UploadCommitRequest, UploadFileRequest, UploadInitRequest,
};

use crate::context::ServerContext;
use crate::handler::Handler;

pub fn routes(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    addnode_route(Arc::clone(&ctx))
        .or(upload_open_route(Arc::clone(&ctx)))
        .or(upload_init_route(Arc::clone(&ctx)))
        .or(upload_file_route(Arc::clone(&ctx)))
        .or(upload_commit_route(Arc::clone(&ctx)))
        .or(download_open_route(Arc::clone(&ctx)))
        .or(download_route(ctx))
}

/// Serve until shutdown, using TLS when the certificate pair is present under
/// the home's `cert/` directory and logging the plaintext fallback otherwise.
pub async fn run_server(ctx: Arc<ServerContext>, addr: SocketAddr) {
    start_session_sweeper(Arc::clone(&ctx));

    let cert = ctx.home().server_cert_path();
    let key = ctx.home().server_cert_key_path();
    let r = routes(Arc::clone(&ctx));

    if cert.is_file() && key.is_file() {
        info!("listening on {addr} with TLS");
        warp::serve(r).tls().cert_path(cert).key_path(key).run(addr).await;
    } else {
        warn!(
            "no TLS certificates under {}, falling back to plaintext transport",
            ctx.home().cert_dir().display()
        );
        info!("listening on {addr}");
        warp::serve(r).run(addr).await;
    }
}

/// Abandoned exchanges would otherwise pin their buffered files until the
/// nonce is presented again; reap them shortly after their deadline.
fn start_session_sweeper(ctx: Arc<ServerContext>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            ctx.sessions().sweep();
        }
    });
}

fn with_context(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = (Arc<ServerContext>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&ctx))
}

fn addnode_route(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("v1" / "addnode")
        .and(warp::post())
        .and(with_context(ctx))
        .and(json())
        .and_then(|ctx: Arc<ServerContext>, req: AddNodeRequest| async move {
            Handler::new(ctx).add_node(req).await
        })
}

fn upload_open_route(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("v1" / "upload" / "open")
        .and(warp::post())
        .and(with_context(ctx))
        .and_then(|ctx: Arc<ServerContext>| async move { Handler::new(ctx).upload_open().await })
}

fn upload_init_route(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("v1" / "upload" / "init")
        .and(warp::post())
        .and(with_context(ctx))
        .and(json())
        .and_then(|ctx: Arc<ServerContext>, req: UploadInitRequest| async move {
            Handler::new(ctx).upload_init(req).await
        })
}

fn upload_file_route(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("v1" / "upload" / "file")
        .and(warp::post())
        .and(with_context(ctx))
        .and(json())
        .and_then(|ctx: Arc<ServerContext>, req: UploadFileRequest| async move {
            Handler::new(ctx).upload_file(req).await
        })
}

fn upload_commit_route(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("v1" / "upload" / "commit")
        .and(warp::post())
        .and(with_context(ctx))
        .and(json())
        .and_then(|ctx: Arc<ServerContext>, req: UploadCommitRequest| async move {
            Handler::new(ctx).upload_commit(req).await
        })
}

fn download_open_route(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("v1" / "download" / "open")
        .and(warp::post())
        .and(with_context(ctx))
        .and_then(|ctx: Arc<ServerContext>| async move { Handler::new(ctx).download_open().await })
}

fn download_route(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("v1" / "download")
        .and(warp::post())
        .and(with_context(ctx))
        .and(json())
        .and_then(|ctx: Arc<ServerContext>, req: DownloadRequest| async move {
            Handler::new(ctx).download(req).await
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use filebank_crypto::ed25519::{
        bank_address, import_public_key_pem, verify_signature, BankKeypair,
    };
    use filebank_crypto::nonce::random_nonce;
    use filebank_proto::messages::{
        sign_bytes, SignAddNodeServer, SignDownloadRequestClient, SignMerkleRootServer,
        SignUploadRequestClient,
    };
    use filebank_proto::wire::{
        decode_array, decode_bytes, encode_bytes, AddNodeResponse, ErrorBody,
        FileAndProofResponse, MerkleRootResponse, OpenReply,
    };
    use filebank_storage::BankHome;
    use merkle::{MerkleProof, MerkleTree};
    use serde::de::DeserializeOwned;
    use warp::filters::BoxedFilter;

    fn test_context() -> (tempfile::TempDir, Arc<ServerContext>) {
        let dir = tempfile::tempdir().unwrap();
        let home = BankHome::new(dir.path().join("home"));
        home.init().unwrap();
        let ctx = Arc::new(ServerContext::new(home, BankKeypair::generate()).unwrap());
        (dir, ctx)
    }

    fn test_routes(ctx: &Arc<ServerContext>) -> BoxedFilter<(impl Reply,)> {
        routes(Arc::clone(ctx)).boxed()
    }

    fn parse_body<T: DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).unwrap()
    }

    async fn post_json<R, B>(
        filter: &BoxedFilter<(R,)>,
        path: &str,
        body: &B,
    ) -> (warp::http::StatusCode, Vec<u8>)
    where
        R: Reply + Send + 'static,
        B: serde::Serialize,
    {
        let resp = warp::test::request()
            .method("POST")
            .path(path)
            .json(body)
            .reply(filter)
            .await;
        (resp.status(), resp.body().to_vec())
    }

    async fn post_empty<R>(filter: &BoxedFilter<(R,)>, path: &str) -> (warp::http::StatusCode, Vec<u8>)
    where
        R: Reply + Send + 'static,
    {
        let resp = warp::test::request()
            .method("POST")
            .path(path)
            .reply(filter)
            .await;
        (resp.status(), resp.body().to_vec())
    }

    fn expect_error(status: warp::http::StatusCode, body: &[u8], kind: &str) {
        assert!(!status.is_success(), "expected failure, got {status}");
        let err: ErrorBody = parse_body(body);
        assert_eq!(err.error, kind, "unexpected error body: {err:?}");
    }

    async fn open_nonce<R>(filter: &BoxedFilter<(R,)>, path: &str) -> [u8; 12]
    where
        R: Reply + Send + 'static,
    {
        let (status, body) = post_empty(filter, path).await;
        assert!(status.is_success());
        let reply: OpenReply = parse_body(&body);
        decode_array(&reply.nonce).unwrap()
    }

    /// Drive the whole client side of an upload against the routes.
    async fn run_upload<R>(
        filter: &BoxedFilter<(R,)>,
        keypair: &BankKeypair,
        files: &[Vec<u8>],
    ) -> (MerkleRootResponse, [u8; 12])
    where
        R: Reply + Send + 'static,
    {
        let pub_key_pem = keypair.public_key_pem().unwrap();
        let nonce = open_nonce(filter, "/v1/upload/open").await;

        let shape = SignUploadRequestClient {
            nonce,
            pub_key_pem: pub_key_pem.clone(),
            nb_files: files.len() as i32,
        };
        let signature = keypair.sign(&sign_bytes(&shape).unwrap());
        let (status, body) = post_json(
            filter,
            "/v1/upload/init",
            &UploadInitRequest {
                nonce: encode_bytes(&nonce),
                pub_key: pub_key_pem,
                nb_files: files.len() as i32,
                signature: encode_bytes(&signature),
            },
        )
        .await;
        assert!(status.is_success(), "init failed: {body:?}");

        for (i, file) in files.iter().enumerate() {
            let (status, body) = post_json(
                filter,
                "/v1/upload/file",
                &UploadFileRequest {
                    nonce: encode_bytes(&nonce),
                    seq: i as i32 + 1,
                    content: encode_bytes(file),
                },
            )
            .await;
            assert!(status.is_success(), "file {} failed: {body:?}", i + 1);
        }

        let client_nonce = random_nonce();
        let (status, body) = post_json(
            filter,
            "/v1/upload/commit",
            &UploadCommitRequest {
                nonce: encode_bytes(&nonce),
                client_nonce: encode_bytes(&client_nonce),
            },
        )
        .await;
        assert!(status.is_success(), "commit failed: {body:?}");
        (parse_body(&body), client_nonce)
    }

    async fn run_download<R>(
        filter: &BoxedFilter<(R,)>,
        keypair: &BankKeypair,
        file_num: i32,
    ) -> (warp::http::StatusCode, Vec<u8>)
    where
        R: Reply + Send + 'static,
    {
        let addr = bank_address(&keypair.public_key_pem().unwrap());
        let nonce = open_nonce(filter, "/v1/download/open").await;

        let shape = SignDownloadRequestClient {
            nonce,
            pub_key_addr_b58: addr.clone(),
            file_num,
        };
        let signature = keypair.sign(&sign_bytes(&shape).unwrap());
        post_json(
            filter,
            "/v1/download",
            &DownloadRequest {
                nonce: encode_bytes(&nonce),
                pub_key_addr: addr,
                file_num,
                signature: encode_bytes(&signature),
            },
        )
        .await
    }

    fn test_files() -> Vec<Vec<u8>> {
        vec![
            b"first ciphertext".to_vec(),
            b"second ciphertext".to_vec(),
            b"third ciphertext".to_vec(),
        ]
    }

    #[tokio::test]
    async fn test_addnode_echoes_nonce_and_signs() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);

        let nonce = random_nonce();
        let (status, body) = post_json(
            &filter,
            "/v1/addnode",
            &AddNodeRequest {
                nonce: encode_bytes(&nonce),
            },
        )
        .await;
        assert!(status.is_success());

        let resp: AddNodeResponse = parse_body(&body);
        assert_eq!(decode_array::<12>(&resp.nonce).unwrap(), nonce);

        let pub_key = import_public_key_pem(&resp.pub_key).unwrap();
        let signature = decode_array::<64>(&resp.signature).unwrap();
        let shape = SignAddNodeServer {
            nonce,
            pub_key_pem: resp.pub_key,
        };
        verify_signature(&pub_key, &sign_bytes(&shape).unwrap(), &signature).unwrap();
    }

    #[tokio::test]
    async fn test_upload_then_download_every_file() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();
        let files = test_files();

        let (commit, client_nonce) = run_upload(&filter, &keypair, &files).await;

        // the root is attested under the client's closing nonce
        assert_eq!(decode_array::<12>(&commit.nonce).unwrap(), client_nonce);
        let root: [u8; 32] = decode_array(&commit.merkle_root).unwrap();
        let local_root = MerkleTree::build(&files).unwrap().root();
        assert_eq!(root, local_root);

        let server_key = import_public_key_pem(ctx.pub_key_pem()).unwrap();
        let shape = SignMerkleRootServer {
            nonce: client_nonce,
            merkle_root: root,
        };
        let signature = decode_array::<64>(&commit.signature).unwrap();
        verify_signature(&server_key, &sign_bytes(&shape).unwrap(), &signature).unwrap();

        // every file comes back byte-identical with a verifying proof
        for (i, expected) in files.iter().enumerate() {
            let (status, body) = run_download(&filter, &keypair, i as i32 + 1).await;
            assert!(status.is_success());

            let resp: FileAndProofResponse = parse_body(&body);
            let file = decode_bytes(&resp.file).unwrap();
            assert_eq!(&file, expected);

            let proof = MerkleProof::from_linear(&decode_bytes(&resp.proof).unwrap()).unwrap();
            assert!(proof.verify_file(&file, &local_root));
        }
    }

    #[tokio::test]
    async fn test_duplicate_upload_same_key_fails() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();
        let files = test_files();

        run_upload(&filter, &keypair, &files).await;

        // replay with the same bank key: rejected at the init step
        let pub_key_pem = keypair.public_key_pem().unwrap();
        let nonce = open_nonce(&filter, "/v1/upload/open").await;
        let shape = SignUploadRequestClient {
            nonce,
            pub_key_pem: pub_key_pem.clone(),
            nb_files: files.len() as i32,
        };
        let signature = keypair.sign(&sign_bytes(&shape).unwrap());
        let (status, body) = post_json(
            &filter,
            "/v1/upload/init",
            &UploadInitRequest {
                nonce: encode_bytes(&nonce),
                pub_key: pub_key_pem,
                nb_files: files.len() as i32,
                signature: encode_bytes(&signature),
            },
        )
        .await;
        expect_error(status, &body, "AlreadyExists");
    }

    #[tokio::test]
    async fn test_wrong_nonce_aborts_upload_without_persistence() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();
        let pub_key_pem = keypair.public_key_pem().unwrap();

        let _issued = open_nonce(&filter, "/v1/upload/open").await;
        let forged = random_nonce();
        let shape = SignUploadRequestClient {
            nonce: forged,
            pub_key_pem: pub_key_pem.clone(),
            nb_files: 1,
        };
        let signature = keypair.sign(&sign_bytes(&shape).unwrap());
        let (status, body) = post_json(
            &filter,
            "/v1/upload/init",
            &UploadInitRequest {
                nonce: encode_bytes(&forged),
                pub_key: pub_key_pem.clone(),
                nb_files: 1,
                signature: encode_bytes(&signature),
            },
        )
        .await;
        expect_error(status, &body, "BadNonce");
        assert!(!ctx.home().server_bank_exists(&bank_address(&pub_key_pem)));
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();
        let other = BankKeypair::generate();
        let pub_key_pem = keypair.public_key_pem().unwrap();

        let nonce = open_nonce(&filter, "/v1/upload/open").await;
        let shape = SignUploadRequestClient {
            nonce,
            pub_key_pem: pub_key_pem.clone(),
            nb_files: 1,
        };
        // signed with a key that does not match the presented public key
        let signature = other.sign(&sign_bytes(&shape).unwrap());
        let (status, body) = post_json(
            &filter,
            "/v1/upload/init",
            &UploadInitRequest {
                nonce: encode_bytes(&nonce),
                pub_key: pub_key_pem,
                nb_files: 1,
                signature: encode_bytes(&signature),
            },
        )
        .await;
        expect_error(status, &body, "BadSignature");
    }

    #[tokio::test]
    async fn test_out_of_order_file_aborts_session() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();
        let pub_key_pem = keypair.public_key_pem().unwrap();

        let nonce = open_nonce(&filter, "/v1/upload/open").await;
        let shape = SignUploadRequestClient {
            nonce,
            pub_key_pem: pub_key_pem.clone(),
            nb_files: 2,
        };
        let signature = keypair.sign(&sign_bytes(&shape).unwrap());
        let (status, _) = post_json(
            &filter,
            "/v1/upload/init",
            &UploadInitRequest {
                nonce: encode_bytes(&nonce),
                pub_key: pub_key_pem.clone(),
                nb_files: 2,
                signature: encode_bytes(&signature),
            },
        )
        .await;
        assert!(status.is_success());

        // seq 2 before seq 1
        let (status, body) = post_json(
            &filter,
            "/v1/upload/file",
            &UploadFileRequest {
                nonce: encode_bytes(&nonce),
                seq: 2,
                content: encode_bytes(b"late"),
            },
        )
        .await;
        expect_error(status, &body, "OrderViolation");

        // the session is gone: a corrected message cannot resume it
        let (status, body) = post_json(
            &filter,
            "/v1/upload/file",
            &UploadFileRequest {
                nonce: encode_bytes(&nonce),
                seq: 1,
                content: encode_bytes(b"first"),
            },
        )
        .await;
        expect_error(status, &body, "BadNonce");
        assert!(!ctx.home().server_bank_exists(&bank_address(&pub_key_pem)));
    }

    #[tokio::test]
    async fn test_commit_before_all_files_rejected() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();
        let pub_key_pem = keypair.public_key_pem().unwrap();

        let nonce = open_nonce(&filter, "/v1/upload/open").await;
        let shape = SignUploadRequestClient {
            nonce,
            pub_key_pem: pub_key_pem.clone(),
            nb_files: 2,
        };
        let signature = keypair.sign(&sign_bytes(&shape).unwrap());
        post_json(
            &filter,
            "/v1/upload/init",
            &UploadInitRequest {
                nonce: encode_bytes(&nonce),
                pub_key: pub_key_pem,
                nb_files: 2,
                signature: encode_bytes(&signature),
            },
        )
        .await;
        post_json(
            &filter,
            "/v1/upload/file",
            &UploadFileRequest {
                nonce: encode_bytes(&nonce),
                seq: 1,
                content: encode_bytes(b"only one"),
            },
        )
        .await;

        let (status, body) = post_json(
            &filter,
            "/v1/upload/commit",
            &UploadCommitRequest {
                nonce: encode_bytes(&nonce),
                client_nonce: encode_bytes(&random_nonce()),
            },
        )
        .await;
        expect_error(status, &body, "Malformed");
    }

    #[tokio::test]
    async fn test_download_out_of_range() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();
        let files = test_files();
        run_upload(&filter, &keypair, &files).await;

        let (status, body) = run_download(&filter, &keypair, 0).await;
        expect_error(status, &body, "OutOfRange");

        let (status, body) = run_download(&filter, &keypair, files.len() as i32 + 1).await;
        expect_error(status, &body, "OutOfRange");
    }

    #[tokio::test]
    async fn test_download_unknown_bank() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();

        let (status, body) = run_download(&filter, &keypair, 1).await;
        expect_error(status, &body, "NotFoundLocal");
    }

    #[tokio::test]
    async fn test_download_signed_with_wrong_key() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();
        run_upload(&filter, &keypair, &test_files()).await;

        let addr = bank_address(&keypair.public_key_pem().unwrap());
        let nonce = open_nonce(&filter, "/v1/download/open").await;
        let intruder = BankKeypair::generate();
        let shape = SignDownloadRequestClient {
            nonce,
            pub_key_addr_b58: addr.clone(),
            file_num: 1,
        };
        let signature = intruder.sign(&sign_bytes(&shape).unwrap());
        let (status, body) = post_json(
            &filter,
            "/v1/download",
            &DownloadRequest {
                nonce: encode_bytes(&nonce),
                pub_key_addr: addr,
                file_num: 1,
                signature: encode_bytes(&signature),
            },
        )
        .await;
        expect_error(status, &body, "BadSignature");
    }

    #[tokio::test]
    async fn test_swapped_stored_files_return_wrong_file_with_valid_proof() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();
        let files = test_files();
        run_upload(&filter, &keypair, &files).await;

        // swap files 1 and 2 behind the server's back
        let addr = bank_address(&keypair.public_key_pem().unwrap());
        let dir = ctx.home().server_dir().join(&addr);
        let first = std::fs::read(dir.join("1")).unwrap();
        let second = std::fs::read(dir.join("2")).unwrap();
        std::fs::write(dir.join("1"), &second).unwrap();
        std::fs::write(dir.join("2"), &first).unwrap();

        // file numbers are not bound to leaves, so the wrong file comes back
        // under a proof that still verifies against the root
        let (status, body) = run_download(&filter, &keypair, 1).await;
        assert!(status.is_success());
        let resp: FileAndProofResponse = parse_body(&body);
        let file = decode_bytes(&resp.file).unwrap();
        assert_eq!(file, files[1]);
        assert_ne!(file, files[0]);

        let root = MerkleTree::build(&files).unwrap().root();
        let proof = MerkleProof::from_linear(&decode_bytes(&resp.proof).unwrap()).unwrap();
        assert!(proof.verify_file(&file, &root));
    }

    #[tokio::test]
    async fn test_tampered_stored_ciphertext_fails_download() {
        let (_dir, ctx) = test_context();
        let filter = test_routes(&ctx);
        let keypair = BankKeypair::generate();
        run_upload(&filter, &keypair, &test_files()).await;

        // flip the stored bytes of file 1 behind the server's back
        let addr = bank_address(&keypair.public_key_pem().unwrap());
        let stored = ctx.home().server_dir().join(&addr).join("1");
        std::fs::write(&stored, b"tampered bytes").unwrap();

        // the leaf no longer exists in the stored tree, so no proof can be
        // produced and no file is emitted
        let (status, body) = run_download(&filter, &keypair, 1).await;
        assert!(!status.is_success());
        let err: ErrorBody = parse_body(&body);
        assert_eq!(err.error, "Internal");
    }
}
