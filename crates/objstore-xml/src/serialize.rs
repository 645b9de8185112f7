//! Converting model types to XML documents.
//!
//! Request bodies written by the client (`CompleteMultipartUpload`, `Delete`,
//! `CreateBucketConfiguration`) and the response documents produced by the
//! in-memory store both go through [`to_xml`].

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use objstore_model::types::{
    Bucket, CommonPrefix, CompleteMultipartUpload, CompleteMultipartUploadResult, CompletedPart,
    CopyObjectResult, CreateBucketConfiguration, Delete, DeleteError, DeleteResult, DeletedObject,
    InitiateMultipartUploadResult, ListBucketsResult, ListMultipartUploadsResult,
    ListObjectsV2Result, ListPartsResult, MultipartUpload, Object, ObjectIdentifier, Part,
};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use crate::error::XmlError;

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for serializing model types to XML.
///
/// Implementors write their content as child elements inside the current XML
/// context. The root element is written by [`to_xml`].
pub trait XmlSerialize {
    /// Serialize this value as XML child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a value as a complete XML document under `root_element`.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml<T: XmlSerialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

/// Format a timestamp as ISO 8601 with milliseconds and a `Z` suffix.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, v)?;
    }
    Ok(())
}

fn write_bool<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text_element(writer, tag, if value { "true" } else { "false" })
}

fn write_optional_display<W: Write, T: std::fmt::Display>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<T>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, &v.to_string())?;
    }
    Ok(())
}

fn write_optional_timestamp<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&DateTime<Utc>>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, &format_timestamp(v))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

impl XmlSerialize for Bucket {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Bucket").write_inner_content(|w| {
            write_text_element(w, "Name", &self.name)?;
            write_optional_timestamp(w, "CreationDate", self.creation_date.as_ref())?;
            Ok(())
        })?;
        Ok(())
    }
}

impl XmlSerialize for ListBucketsResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Buckets").write_inner_content(|w| {
            for bucket in &self.buckets {
                bucket.serialize_xml(w)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl XmlSerialize for CreateBucketConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(
            writer,
            "LocationConstraint",
            self.location_constraint.as_deref(),
        )
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

impl XmlSerialize for Object {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Contents").write_inner_content(|w| {
            write_text_element(w, "Key", &self.key)?;
            write_optional_timestamp(w, "LastModified", self.last_modified.as_ref())?;
            write_optional_text(w, "ETag", self.e_tag.as_deref())?;
            write_text_element(w, "Size", &self.size.to_string())?;
            write_optional_text(w, "StorageClass", self.storage_class.as_deref())?;
            Ok(())
        })?;
        Ok(())
    }
}

impl XmlSerialize for CommonPrefix {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer
            .create_element("CommonPrefixes")
            .write_inner_content(|w| write_text_element(w, "Prefix", &self.prefix))?;
        Ok(())
    }
}

impl XmlSerialize for ListObjectsV2Result {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Name", &self.name)?;
        write_optional_text(writer, "Prefix", self.prefix.as_deref())?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_optional_display(writer, "MaxKeys", self.max_keys)?;
        write_optional_display(writer, "KeyCount", self.key_count)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        write_optional_text(
            writer,
            "ContinuationToken",
            self.continuation_token.as_deref(),
        )?;
        write_optional_text(
            writer,
            "NextContinuationToken",
            self.next_continuation_token.as_deref(),
        )?;
        write_optional_text(writer, "StartAfter", self.start_after.as_deref())?;
        for object in &self.contents {
            object.serialize_xml(writer)?;
        }
        for prefix in &self.common_prefixes {
            prefix.serialize_xml(writer)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

impl XmlSerialize for InitiateMultipartUploadResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)?;
        Ok(())
    }
}

impl XmlSerialize for CompletedPart {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Part").write_inner_content(|w| {
            write_text_element(w, "PartNumber", &self.part_number.to_string())?;
            write_text_element(w, "ETag", &self.e_tag)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl XmlSerialize for CompleteMultipartUpload {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for part in &self.parts {
            part.serialize_xml(writer)?;
        }
        Ok(())
    }
}

impl XmlSerialize for CompleteMultipartUploadResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "Location", self.location.as_deref())?;
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_optional_text(writer, "ETag", self.e_tag.as_deref())?;
        Ok(())
    }
}

impl XmlSerialize for Part {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Part").write_inner_content(|w| {
            write_text_element(w, "PartNumber", &self.part_number.to_string())?;
            write_optional_timestamp(w, "LastModified", self.last_modified.as_ref())?;
            write_optional_text(w, "ETag", self.e_tag.as_deref())?;
            write_text_element(w, "Size", &self.size.to_string())?;
            Ok(())
        })?;
        Ok(())
    }
}

impl XmlSerialize for ListPartsResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        write_optional_display(writer, "NextPartNumberMarker", self.next_part_number_marker)?;
        for part in &self.parts {
            part.serialize_xml(writer)?;
        }
        Ok(())
    }
}

impl XmlSerialize for MultipartUpload {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Upload").write_inner_content(|w| {
            write_text_element(w, "Key", &self.key)?;
            write_text_element(w, "UploadId", &self.upload_id)?;
            write_optional_timestamp(w, "Initiated", self.initiated.as_ref())?;
            Ok(())
        })?;
        Ok(())
    }
}

impl XmlSerialize for ListMultipartUploadsResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        write_optional_text(writer, "NextKeyMarker", self.next_key_marker.as_deref())?;
        write_optional_text(
            writer,
            "NextUploadIdMarker",
            self.next_upload_id_marker.as_deref(),
        )?;
        for upload in &self.uploads {
            upload.serialize_xml(writer)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Copy / delete
// ---------------------------------------------------------------------------

impl XmlSerialize for CopyObjectResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_timestamp(writer, "LastModified", self.last_modified.as_ref())?;
        write_optional_text(writer, "ETag", self.e_tag.as_deref())?;
        Ok(())
    }
}

impl XmlSerialize for ObjectIdentifier {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer
            .create_element("Object")
            .write_inner_content(|w| write_text_element(w, "Key", &self.key))?;
        Ok(())
    }
}

impl XmlSerialize for Delete {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        if self.quiet {
            write_bool(writer, "Quiet", true)?;
        }
        for object in &self.objects {
            object.serialize_xml(writer)?;
        }
        Ok(())
    }
}

impl XmlSerialize for DeletedObject {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer
            .create_element("Deleted")
            .write_inner_content(|w| write_text_element(w, "Key", &self.key))?;
        Ok(())
    }
}

impl XmlSerialize for DeleteError {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Error").write_inner_content(|w| {
            write_text_element(w, "Key", &self.key)?;
            write_text_element(w, "Code", &self.code)?;
            write_text_element(w, "Message", &self.message)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl XmlSerialize for DeleteResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for deleted in &self.deleted {
            deleted.serialize_xml(writer)?;
        }
        for error in &self.errors {
            error.serialize_xml(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_complete_multipart_upload() {
        let body = CompleteMultipartUpload {
            parts: vec![
                CompletedPart {
                    part_number: 1,
                    e_tag: "\"a54357aff0632cce46d942af68356b38\"".to_owned(),
                },
                CompletedPart {
                    part_number: 2,
                    e_tag: "\"0c78aef83f66abc1fa1e8477f296d394\"".to_owned(),
                },
            ],
        };

        let xml = to_xml("CompleteMultipartUpload", &body).expect("serialization should succeed");
        let xml_str = std::str::from_utf8(&xml).expect("valid UTF-8");

        assert!(xml_str.contains(
            "<CompleteMultipartUpload xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">"
        ));
        assert!(xml_str.contains("<Part><PartNumber>1</PartNumber><ETag>"));
        assert!(xml_str.find("<PartNumber>1<") < xml_str.find("<PartNumber>2<"));
    }

    #[test]
    fn test_should_serialize_quiet_delete() {
        let body = Delete {
            objects: vec![
                ObjectIdentifier {
                    key: "a.txt".to_owned(),
                },
                ObjectIdentifier {
                    key: "dir/b & c.txt".to_owned(),
                },
            ],
            quiet: true,
        };

        let xml = to_xml("Delete", &body).expect("serialization should succeed");
        let xml_str = std::str::from_utf8(&xml).expect("valid UTF-8");

        assert!(xml_str.contains("<Quiet>true</Quiet>"));
        assert!(xml_str.contains("<Object><Key>a.txt</Key></Object>"));
        assert!(xml_str.contains("<Key>dir/b &amp; c.txt</Key>"));
    }

    #[test]
    fn test_should_serialize_listing_with_prefixes() {
        let page = ListObjectsV2Result {
            name: "bucket".to_owned(),
            prefix: Some("photos/".to_owned()),
            delimiter: Some("/".to_owned()),
            key_count: Some(2),
            is_truncated: false,
            contents: vec![Object {
                key: "photos/a.jpg".to_owned(),
                size: 12,
                ..Object::default()
            }],
            common_prefixes: vec![CommonPrefix {
                prefix: "photos/2024/".to_owned(),
            }],
            ..ListObjectsV2Result::default()
        };

        let xml = to_xml("ListBucketResult", &page).expect("serialization should succeed");
        let xml_str = std::str::from_utf8(&xml).expect("valid UTF-8");

        assert!(xml_str.contains("<IsTruncated>false</IsTruncated>"));
        assert!(xml_str.contains("<Contents><Key>photos/a.jpg</Key><Size>12</Size></Contents>"));
        assert!(xml_str.contains("<CommonPrefixes><Prefix>photos/2024/</Prefix></CommonPrefixes>"));
        assert!(!xml_str.contains("NextContinuationToken"));
    }
}
