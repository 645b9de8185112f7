//! Parsing XML documents into model types.
//!
//! Text is read untrimmed: object keys may legitimately start or end with
//! whitespace and must survive a listing unchanged.

use chrono::{DateTime, Utc};
use objstore_model::types::{
    Bucket, CommonPrefix, CompleteMultipartUpload, CompleteMultipartUploadResult, CompletedPart,
    CopyObjectResult, CreateBucketConfiguration, Delete, DeleteError, DeleteResult, DeletedObject,
    InitiateMultipartUploadResult, ListBucketsResult, ListMultipartUploadsResult,
    ListObjectsV2Result, ListPartsResult, MultipartUpload, Object, ObjectIdentifier, Part,
};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::XmlError;

/// Trait for deserializing model types from XML.
///
/// The root element has already been consumed by the caller; the
/// implementation reads child elements until the matching end tag.
pub trait XmlDeserialize: Sized {
    /// Deserialize an instance from the given XML reader.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the XML is malformed or a value fails to parse.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Deserialize an XML document into a typed value.
///
/// # Errors
///
/// Returns `XmlError` if the XML is malformed or deserialization fails.
pub fn from_xml<T: XmlDeserialize>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    loop {
        match reader.read_event()? {
            Event::Start(_) => return T::deserialize_xml(&mut reader),
            Event::Eof => {
                return Err(XmlError::MissingElement("root element".to_owned()));
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Visit every child element of the current element, then consume its end tag.
///
/// `on_child` receives the child's local name and must consume the child
/// (typically with [`read_text_content`], [`skip_element`] or a nested
/// `deserialize_xml`).
pub(crate) fn read_children<F>(
    reader: &mut Reader<&[u8]>,
    context: &str,
    mut on_child: F,
) -> Result<(), XmlError>
where
    F: FnMut(&mut Reader<&[u8]>, &str) -> Result<(), XmlError>,
{
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let local = e.local_name();
                let name = std::str::from_utf8(local.as_ref())
                    .map_err(|err| XmlError::ParseError(err.to_string()))?
                    .to_owned();
                on_child(reader, &name)?;
            }
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(format!(
                    "unexpected EOF in {context}"
                )));
            }
            _ => {}
        }
    }
}

/// Read the text content of the current element and consume its end tag.
///
/// Entity and character references arrive as separate events and are
/// resolved in place.
pub(crate) fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&decoded);
            }
            Event::CData(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&decoded);
            }
            Event::GeneralRef(e) => {
                if let Some(ch) = e
                    .resolve_char_ref()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?
                {
                    text.push(ch);
                } else {
                    let name = e
                        .decode()
                        .map_err(|err| XmlError::ParseError(err.to_string()))?;
                    let resolved = quick_xml::escape::resolve_predefined_entity(&name)
                        .ok_or_else(|| XmlError::ParseError(format!("unknown entity &{name};")))?;
                    text.push_str(resolved);
                }
            }
            Event::End(_) => return Ok(text),
            Event::Start(e) => {
                return Err(XmlError::UnexpectedElement(
                    String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                ));
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while reading text content".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
pub(crate) fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while skipping element".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

fn parse_bool(s: &str) -> Result<bool, XmlError> {
    match s.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(XmlError::ParseError(format!("invalid boolean: {other}"))),
    }
}

fn parse_number<T>(s: &str) -> Result<T, XmlError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    s.trim()
        .parse::<T>()
        .map_err(|e| XmlError::ParseError(format!("invalid number '{s}': {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, XmlError> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| XmlError::ParseError(format!("invalid timestamp '{s}': {e}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

impl XmlDeserialize for Bucket {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = Bucket::default();
        read_children(reader, "Bucket", |reader, name| {
            match name {
                "Name" => out.name = read_text_content(reader)?,
                "CreationDate" => {
                    out.creation_date = Some(parse_timestamp(&read_text_content(reader)?)?);
                }
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for ListBucketsResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut buckets = Vec::new();
        read_children(reader, "ListAllMyBucketsResult", |reader, name| {
            if name == "Buckets" {
                read_children(reader, "Buckets", |reader, name| {
                    if name == "Bucket" {
                        buckets.push(Bucket::deserialize_xml(reader)?);
                    } else {
                        skip_element(reader)?;
                    }
                    Ok(())
                })
            } else {
                skip_element(reader)
            }
        })?;
        Ok(ListBucketsResult { buckets })
    }
}

impl XmlDeserialize for CreateBucketConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = CreateBucketConfiguration::default();
        read_children(reader, "CreateBucketConfiguration", |reader, name| {
            if name == "LocationConstraint" {
                out.location_constraint = non_empty(read_text_content(reader)?);
                Ok(())
            } else {
                skip_element(reader)
            }
        })?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

impl XmlDeserialize for Object {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = Object::default();
        read_children(reader, "Contents", |reader, name| {
            match name {
                "Key" => out.key = read_text_content(reader)?,
                "LastModified" => {
                    out.last_modified = Some(parse_timestamp(&read_text_content(reader)?)?);
                }
                "ETag" => out.e_tag = Some(read_text_content(reader)?),
                "Size" => out.size = parse_number(&read_text_content(reader)?)?,
                "StorageClass" => out.storage_class = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for CommonPrefix {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = CommonPrefix::default();
        read_children(reader, "CommonPrefixes", |reader, name| {
            if name == "Prefix" {
                out.prefix = read_text_content(reader)?;
                Ok(())
            } else {
                skip_element(reader)
            }
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for ListObjectsV2Result {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = ListObjectsV2Result::default();
        read_children(reader, "ListBucketResult", |reader, name| {
            match name {
                "Name" => out.name = read_text_content(reader)?,
                "Prefix" => out.prefix = non_empty(read_text_content(reader)?),
                "Delimiter" => out.delimiter = non_empty(read_text_content(reader)?),
                "MaxKeys" => out.max_keys = Some(parse_number(&read_text_content(reader)?)?),
                "KeyCount" => out.key_count = Some(parse_number(&read_text_content(reader)?)?),
                "IsTruncated" => out.is_truncated = parse_bool(&read_text_content(reader)?)?,
                "ContinuationToken" => {
                    out.continuation_token = non_empty(read_text_content(reader)?);
                }
                "NextContinuationToken" => {
                    out.next_continuation_token = non_empty(read_text_content(reader)?);
                }
                "StartAfter" => out.start_after = non_empty(read_text_content(reader)?),
                "Contents" => out.contents.push(Object::deserialize_xml(reader)?),
                "CommonPrefixes" => out
                    .common_prefixes
                    .push(CommonPrefix::deserialize_xml(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

impl XmlDeserialize for InitiateMultipartUploadResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = InitiateMultipartUploadResult::default();
        read_children(reader, "InitiateMultipartUploadResult", |reader, name| {
            match name {
                "Bucket" => out.bucket = read_text_content(reader)?,
                "Key" => out.key = read_text_content(reader)?,
                "UploadId" => out.upload_id = read_text_content(reader)?,
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        if out.upload_id.is_empty() {
            return Err(XmlError::MissingElement("UploadId".to_owned()));
        }
        Ok(out)
    }
}

impl XmlDeserialize for CompletedPart {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = CompletedPart::default();
        read_children(reader, "Part", |reader, name| {
            match name {
                "PartNumber" => out.part_number = parse_number(&read_text_content(reader)?)?,
                "ETag" => out.e_tag = read_text_content(reader)?,
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for CompleteMultipartUpload {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut parts = Vec::new();
        read_children(reader, "CompleteMultipartUpload", |reader, name| {
            if name == "Part" {
                parts.push(CompletedPart::deserialize_xml(reader)?);
                Ok(())
            } else {
                skip_element(reader)
            }
        })?;
        Ok(CompleteMultipartUpload { parts })
    }
}

impl XmlDeserialize for CompleteMultipartUploadResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = CompleteMultipartUploadResult::default();
        read_children(reader, "CompleteMultipartUploadResult", |reader, name| {
            match name {
                "Location" => out.location = Some(read_text_content(reader)?),
                "Bucket" => out.bucket = read_text_content(reader)?,
                "Key" => out.key = read_text_content(reader)?,
                "ETag" => out.e_tag = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for Part {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = Part::default();
        read_children(reader, "Part", |reader, name| {
            match name {
                "PartNumber" => out.part_number = parse_number(&read_text_content(reader)?)?,
                "LastModified" => {
                    out.last_modified = Some(parse_timestamp(&read_text_content(reader)?)?);
                }
                "ETag" => out.e_tag = Some(read_text_content(reader)?),
                "Size" => out.size = parse_number(&read_text_content(reader)?)?,
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for ListPartsResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = ListPartsResult::default();
        read_children(reader, "ListPartsResult", |reader, name| {
            match name {
                "Bucket" => out.bucket = read_text_content(reader)?,
                "Key" => out.key = read_text_content(reader)?,
                "UploadId" => out.upload_id = read_text_content(reader)?,
                "IsTruncated" => out.is_truncated = parse_bool(&read_text_content(reader)?)?,
                "NextPartNumberMarker" => {
                    let text = read_text_content(reader)?;
                    if !text.trim().is_empty() {
                        out.next_part_number_marker = Some(parse_number(&text)?);
                    }
                }
                "Part" => out.parts.push(Part::deserialize_xml(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for MultipartUpload {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = MultipartUpload::default();
        read_children(reader, "Upload", |reader, name| {
            match name {
                "Key" => out.key = read_text_content(reader)?,
                "UploadId" => out.upload_id = read_text_content(reader)?,
                "Initiated" => {
                    out.initiated = Some(parse_timestamp(&read_text_content(reader)?)?);
                }
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for ListMultipartUploadsResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = ListMultipartUploadsResult::default();
        read_children(reader, "ListMultipartUploadsResult", |reader, name| {
            match name {
                "Bucket" => out.bucket = read_text_content(reader)?,
                "IsTruncated" => out.is_truncated = parse_bool(&read_text_content(reader)?)?,
                "NextKeyMarker" => out.next_key_marker = non_empty(read_text_content(reader)?),
                "NextUploadIdMarker" => {
                    out.next_upload_id_marker = non_empty(read_text_content(reader)?);
                }
                "Upload" => out.uploads.push(MultipartUpload::deserialize_xml(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Copy / delete
// ---------------------------------------------------------------------------

impl XmlDeserialize for CopyObjectResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = CopyObjectResult::default();
        read_children(reader, "CopyObjectResult", |reader, name| {
            match name {
                "ETag" => out.e_tag = Some(read_text_content(reader)?),
                "LastModified" => {
                    out.last_modified = Some(parse_timestamp(&read_text_content(reader)?)?);
                }
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for ObjectIdentifier {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = ObjectIdentifier::default();
        read_children(reader, "Object", |reader, name| {
            if name == "Key" {
                out.key = read_text_content(reader)?;
                Ok(())
            } else {
                skip_element(reader)
            }
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for Delete {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = Delete::default();
        read_children(reader, "Delete", |reader, name| {
            match name {
                "Quiet" => out.quiet = parse_bool(&read_text_content(reader)?)?,
                "Object" => out.objects.push(ObjectIdentifier::deserialize_xml(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for DeletedObject {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = DeletedObject::default();
        read_children(reader, "Deleted", |reader, name| {
            if name == "Key" {
                out.key = read_text_content(reader)?;
                Ok(())
            } else {
                skip_element(reader)
            }
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for DeleteError {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = DeleteError::default();
        read_children(reader, "Error", |reader, name| {
            match name {
                "Key" => out.key = read_text_content(reader)?,
                "Code" => out.code = read_text_content(reader)?,
                "Message" => out.message = read_text_content(reader)?,
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}

impl XmlDeserialize for DeleteResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = DeleteResult::default();
        read_children(reader, "DeleteResult", |reader, name| {
            match name {
                "Deleted" => out.deleted.push(DeletedObject::deserialize_xml(reader)?),
                "Error" => out.errors.push(DeleteError::deserialize_xml(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}
