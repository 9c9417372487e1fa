pub mod addnode;
pub mod client;
pub mod download;
pub mod upload;

pub use addnode::call_add_node;
pub use client::NodeClient;
pub use download::call_download_file;
pub use upload::call_upload_files;
