//! The set of object-store operations the client issues.

use std::fmt;

/// All operations issued against the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// The ListBuckets operation.
    ListBuckets,
    /// The CreateBucket operation.
    CreateBucket,
    /// The HeadBucket operation.
    HeadBucket,
    /// The DeleteBucket operation.
    DeleteBucket,
    /// The GetBucketPolicy operation.
    GetBucketPolicy,
    /// The ListObjectsV2 operation.
    ListObjects,
    /// The PutObject operation.
    PutObject,
    /// The GetObject operation.
    GetObject,
    /// The HeadObject operation.
    HeadObject,
    /// The DeleteObject operation.
    DeleteObject,
    /// The DeleteObjects (batch delete) operation.
    DeleteObjects,
    /// The CopyObject operation.
    CopyObject,
    /// The CreateMultipartUpload operation.
    CreateMultipartUpload,
    /// The UploadPart operation.
    UploadPart,
    /// The CompleteMultipartUpload operation.
    CompleteMultipartUpload,
    /// The AbortMultipartUpload operation.
    AbortMultipartUpload,
    /// The ListParts operation.
    ListParts,
    /// The ListMultipartUploads operation.
    ListMultipartUploads,
}

impl Operation {
    /// Return the operation name as used in the service API reference.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListBuckets => "ListBuckets",
            Self::CreateBucket => "CreateBucket",
            Self::HeadBucket => "HeadBucket",
            Self::DeleteBucket => "DeleteBucket",
            Self::GetBucketPolicy => "GetBucketPolicy",
            Self::ListObjects => "ListObjectsV2",
            Self::PutObject => "PutObject",
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::DeleteObject => "DeleteObject",
            Self::DeleteObjects => "DeleteObjects",
            Self::CopyObject => "CopyObject",
            Self::CreateMultipartUpload => "CreateMultipartUpload",
            Self::UploadPart => "UploadPart",
            Self::CompleteMultipartUpload => "CompleteMultipartUpload",
            Self::AbortMultipartUpload => "AbortMultipartUpload",
            Self::ListParts => "ListParts",
            Self::ListMultipartUploads => "ListMultipartUploads",
        }
    }

    /// Whether the operation can be replayed after an ambiguous network failure.
    ///
    /// Completing a multipart upload consumes the upload id on the server, so a
    /// blind replay after the first attempt succeeded would fail with
    /// `NoSuchUpload` even though the object was assembled.
    #[must_use]
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Self::CompleteMultipartUpload)
    }

    /// Whether the operation only reads metadata (the response has no body).
    #[must_use]
    pub fn is_metadata_only(&self) -> bool {
        matches!(self, Self::HeadBucket | Self::HeadObject)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
