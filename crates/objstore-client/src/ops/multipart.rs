//! Multipart upload operations.

use chrono::{DateTime, Utc};
use http::Method;
use http::header::{CONTENT_TYPE, ETAG};
use objstore_model::types::{
    CompleteMultipartUpload, CompleteMultipartUploadResult, CompletedPart,
    InitiateMultipartUploadResult, ListMultipartUploadsResult, ListPartsResult,
};
use objstore_model::{CannedAcl, Operation, codes};
use objstore_xml::{XmlError, error_from_xml};
use tracing::{debug, info, warn};

use super::{parse_body, xml_body};
use crate::client::ObjectStoreClient;
use crate::error::{ClientError, ServiceError};
use crate::request::{Body, RequestDescriptor};

impl ObjectStoreClient {
    /// Start a multipart upload and return its id.
    pub async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        acl: Option<CannedAcl>,
    ) -> Result<String, ClientError> {
        let mut desc = RequestDescriptor::new(Operation::CreateMultipartUpload, Method::POST)
            .bucket(bucket)
            .key(key)
            .flag("uploads")
            .acl(acl);
        if let Some(ct) = content_type {
            desc = desc.header(CONTENT_TYPE.as_str(), ct)?;
        }
        let response = self.send(desc).await?;
        let result: InitiateMultipartUploadResult = parse_body(&response)?;
        debug!(bucket, key, upload_id = %result.upload_id, "multipart upload initiated");
        Ok(result.upload_id)
    }

    /// Upload one part and return its ETag.
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: impl Into<Body>,
    ) -> Result<String, ClientError> {
        let desc = RequestDescriptor::new(Operation::UploadPart, Method::PUT)
            .bucket(bucket)
            .key(key)
            .query("partNumber", part_number.to_string())
            .query("uploadId", upload_id)
            .body(body);
        let response = self.send(desc).await?;
        response
            .header(ETAG.as_str())
            .map(str::to_owned)
            .ok_or_else(|| ClientError::Xml(XmlError::MissingElement("ETag".to_owned())))
    }

    /// Complete a multipart upload.
    ///
    /// `parts` must be non-empty, strictly ascending by part number and carry an ETag
    /// each. The request is never blindly replayed: after an ambiguous transport
    /// failure the upload is inspected. If it is still listed the completion is
    /// re-issued; if it is gone and the object exists the completion succeeded.
    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<CompleteMultipartUploadResult, ClientError> {
        validate_completion(parts)?;
        let body = xml_body(
            "CompleteMultipartUpload",
            &CompleteMultipartUpload {
                parts: parts.to_vec(),
            },
        )?;
        let desc = RequestDescriptor::new(Operation::CompleteMultipartUpload, Method::POST)
            .bucket(bucket)
            .key(key)
            .query("uploadId", upload_id)
            .body(body);

        let mut reissued = 0u32;
        loop {
            match self.send(desc.clone()).await {
                Ok(response) => {
                    // The service may report a failure after sending a 200 status line.
                    if let Some(error) = error_from_xml(&response.body) {
                        return Err(ClientError::Service(ServiceError::from_response(
                            response.status.as_u16(),
                            error,
                        )));
                    }
                    let result: CompleteMultipartUploadResult = parse_body(&response)?;
                    info!(
                        bucket,
                        key,
                        upload_id,
                        parts = parts.len(),
                        "multipart upload completed"
                    );
                    return Ok(result);
                }
                Err(err @ ClientError::Transport(_)) => {
                    match self.completion_outcome(bucket, key, upload_id).await {
                        CompletionOutcome::Completed(result) => {
                            info!(
                                bucket,
                                key,
                                upload_id,
                                "completion confirmed after transport error"
                            );
                            return Ok(result);
                        }
                        CompletionOutcome::Pending if reissued < self.config().max_retries => {
                            reissued += 1;
                            warn!(
                                bucket,
                                key,
                                upload_id,
                                reissued,
                                error = %err,
                                "re-issuing completion"
                            );
                        }
                        CompletionOutcome::Pending | CompletionOutcome::Unknown => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn completion_outcome(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> CompletionOutcome {
        match self.list_parts(bucket, key, upload_id).await {
            Ok(_) => CompletionOutcome::Pending,
            Err(e) if e.code() == Some(codes::NO_SUCH_UPLOAD) => {
                match self.head_object(bucket, key).await {
                    Ok(meta) => CompletionOutcome::Completed(CompleteMultipartUploadResult {
                        location: Some(self.object_url(bucket, key)),
                        bucket: bucket.to_owned(),
                        key: key.to_owned(),
                        e_tag: meta.e_tag,
                    }),
                    Err(_) => CompletionOutcome::Unknown,
                }
            }
            Err(_) => CompletionOutcome::Unknown,
        }
    }

    /// Abort a multipart upload, discarding its parts.
    pub async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), ClientError> {
        self.send(
            RequestDescriptor::new(Operation::AbortMultipartUpload, Method::DELETE)
                .bucket(bucket)
                .key(key)
                .query("uploadId", upload_id),
        )
        .await?;
        debug!(bucket, key, upload_id, "multipart upload aborted");
        Ok(())
    }

    /// List every uploaded part of an upload, following pagination.
    pub async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<ListPartsResult, ClientError> {
        let mut marker: Option<u32> = None;
        let mut all: Option<ListPartsResult> = None;
        loop {
            let mut desc = RequestDescriptor::new(Operation::ListParts, Method::GET)
                .bucket(bucket)
                .key(key)
                .query("uploadId", upload_id);
            if let Some(m) = marker {
                desc = desc.query("part-number-marker", m.to_string());
            }
            let response = self.send(desc).await?;
            let page: ListPartsResult = parse_body(&response)?;
            let next = page.next_part_number_marker.filter(|_| page.is_truncated);

            match &mut all {
                Some(acc) => acc.parts.extend(page.parts),
                None => all = Some(page),
            }
            match next {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        let mut result = all.unwrap_or_default();
        result.is_truncated = false;
        result.next_part_number_marker = None;
        Ok(result)
    }

    /// List in-progress multipart uploads, following pagination.
    pub async fn list_multipart_uploads(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<ListMultipartUploadsResult, ClientError> {
        let mut markers: Option<(String, Option<String>)> = None;
        let mut result = ListMultipartUploadsResult {
            bucket: bucket.to_owned(),
            ..ListMultipartUploadsResult::default()
        };
        loop {
            let mut desc = RequestDescriptor::new(Operation::ListMultipartUploads, Method::GET)
                .bucket(bucket)
                .flag("uploads");
            if let Some(prefix) = prefix {
                desc = desc.query("prefix", prefix);
            }
            if let Some((key_marker, upload_marker)) = &markers {
                desc = desc.query("key-marker", key_marker);
                if let Some(m) = upload_marker {
                    desc = desc.query("upload-id-marker", m);
                }
            }
            let response = self.send(desc).await?;
            let page: ListMultipartUploadsResult = parse_body(&response)?;
            result.uploads.extend(page.uploads);

            match page.next_key_marker {
                Some(key_marker) if page.is_truncated => {
                    markers = Some((key_marker, page.next_upload_id_marker));
                }
                _ => return Ok(result),
            }
        }
    }

    /// Abort every upload under `prefix` initiated before `cutoff`.
    ///
    /// Returns the number of aborted uploads. Uploads without an initiation time are
    /// left alone.
    pub async fn abort_multipart_uploads_before(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, ClientError> {
        let uploads = self.list_multipart_uploads(bucket, prefix).await?.uploads;
        let mut aborted = 0;
        for upload in uploads
            .iter()
            .filter(|u| u.initiated.is_some_and(|t| t < cutoff))
        {
            self.abort_multipart_upload(bucket, &upload.key, &upload.upload_id)
                .await?;
            aborted += 1;
        }
        info!(bucket, ?prefix, %cutoff, aborted, "aborted stale multipart uploads");
        Ok(aborted)
    }
}

#[derive(Debug)]
enum CompletionOutcome {
    Completed(CompleteMultipartUploadResult),
    Pending,
    Unknown,
}

/// Check the part list of a completion request.
///
/// # Errors
///
/// Returns [`ClientError::InvalidArgument`] for an empty list, a missing ETag or part
/// numbers that are not strictly ascending.
pub fn validate_completion(parts: &[CompletedPart]) -> Result<(), ClientError> {
    if parts.is_empty() {
        return Err(ClientError::InvalidArgument(
            "a multipart upload needs at least one part".to_owned(),
        ));
    }
    if let Some(part) = parts.iter().find(|p| p.e_tag.is_empty()) {
        return Err(ClientError::InvalidArgument(format!(
            "part {} has no ETag",
            part.part_number
        )));
    }
    if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
        return Err(ClientError::InvalidArgument(
            "parts must be listed in ascending part-number order".to_owned(),
        ));
    }
    Ok(())
}
