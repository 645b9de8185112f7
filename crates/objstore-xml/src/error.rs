//! XML codec errors and the flat `<Error>` document.

use std::io;

use objstore_model::ErrorResponse;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use crate::deserialize::{XmlDeserialize, from_xml, read_children, read_text_content, skip_element};

/// Errors that can occur while encoding or decoding XML documents.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// An I/O error during XML writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An error from the underlying quick-xml library.
    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    /// A required XML element was missing.
    #[error("missing required XML element: {0}")]
    MissingElement(String),

    /// An unexpected XML element was encountered.
    #[error("unexpected XML element: {0}")]
    UnexpectedElement(String),

    /// An error parsing a value from XML text content.
    #[error("failed to parse value: {0}")]
    ParseError(String),
}

/// Format an error document.
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error>
///   <Code>NoSuchKey</Code>
///   <Message>The specified key does not exist.</Message>
///   <Resource>/bucket/key</Resource>
///   <RequestId>4442587FB7D0A2F9</RequestId>
/// </Error>
/// ```
#[must_use]
pub fn error_to_xml(error: &ErrorResponse) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = write_error_xml(&mut buf, error) {
        tracing::error!(error = %e, "failed to serialize error XML");
        buf.clear();
    }
    buf
}

fn write_error_xml(buf: &mut Vec<u8>, error: &ErrorResponse) -> io::Result<()> {
    let mut writer = Writer::new(buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.create_element("Error").write_inner_content(|w| {
        w.create_element("Code")
            .write_text_content(BytesText::new(&error.code))?;
        w.create_element("Message")
            .write_text_content(BytesText::new(&error.message))?;
        if let Some(res) = &error.resource {
            w.create_element("Resource")
                .write_text_content(BytesText::new(res))?;
        }
        if let Some(id) = &error.request_id {
            w.create_element("RequestId")
                .write_text_content(BytesText::new(id))?;
        }
        Ok(())
    })?;

    Ok(())
}

/// Parse an error document returned by the service.
///
/// Returns `None` when the body is empty or is not an `<Error>` document, which
/// happens for HEAD responses and for proxies that answer with HTML.
#[must_use]
pub fn error_from_xml(body: &[u8]) -> Option<ErrorResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match from_xml::<ErrorResponse>(body) {
        Ok(parsed) if !parsed.code.is_empty() => Some(parsed),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "response body is not an error document");
            None
        }
    }
}

impl XmlDeserialize for ErrorResponse {
    fn deserialize_xml(reader: &mut quick_xml::Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = ErrorResponse::default();
        read_children(reader, "Error", |reader, name| {
            match name {
                "Code" => out.code = read_text_content(reader)?,
                "Message" => out.message = read_text_content(reader)?,
                "Resource" => out.resource = Some(read_text_content(reader)?),
                "RequestId" => out.request_id = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(out)
    }
}
