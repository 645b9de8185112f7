//! Filesystem-style access to an S3-compatible object store.
//!
//! [`StreamWrapper`] maps `<scheme>://bucket/key` URLs onto an
//! [`ObjectStoreClient`](objstore_client::ObjectStoreClient): buckets and key prefixes
//! behave as directories, objects as files that can be opened for reading, writing
//! or appending. Wrappers are registered per scheme in a [`StreamRegistry`].
//!
//! ```no_run
//! # async fn demo(client: objstore_client::ObjectStoreClient) -> std::io::Result<()> {
//! let fs = objstore_fs::StreamWrapper::new(client);
//! let mut file = fs.open("s3://media/notes.txt", "w").await?;
//! file.write(b"hello").await?;
//! file.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod dir;
pub mod error;
pub mod file;
pub mod mode;
pub mod registry;
pub mod stat;
pub mod url;
pub mod wrapper;

pub use dir::ObjectDir;
pub use error::FsError;
pub use file::ObjectFile;
pub use mode::OpenMode;
pub use registry::{StreamRegistry, global, register_global, unregister_global};
pub use stat::{FileKind, FileStat, StatCache};
pub use url::ObjectUrl;
pub use wrapper::{StreamWrapper, WrapperOptions};
