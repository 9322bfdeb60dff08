use quick_xml::events::BytesStart;

use crate::error::ParseError;

pub(crate) fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>, ParseError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

pub(crate) fn require_attribute(
    e: &BytesStart,
    element: &'static str,
    name: &'static str,
) -> Result<String, ParseError> {
    attribute(e, name)?.ok_or(ParseError::MissingAttribute {
        element,
        attribute: name,
    })
}
