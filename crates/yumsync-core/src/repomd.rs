//! repomd.xml parsing.
//!
//! repomd.xml is the entry point of a repository. It carries an optional
//! revision stamp and describes every other metadata file with its
//! location, checksum and size.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ParseError;
use crate::package::Checksum;
use crate::xml::require_attribute;

/// One `<data>` entry from repomd.xml.
#[derive(Debug, Clone, PartialEq)]
pub struct RepomdSection {
    /// The `type` attribute, e.g. `primary` or `filelists`.
    pub section_type: String,
    /// Location relative to the repository base URL.
    pub location: String,
    pub checksum: Checksum,
    pub size: Option<u64>,
}

/// Parsed repomd.xml.
#[derive(Debug, Clone, PartialEq)]
pub struct Repomd {
    pub revision: Option<String>,
    pub sections: Vec<RepomdSection>,
}

impl Repomd {
    /// Looks up a section by type.
    pub fn require_section(&self, section_type: &str) -> Result<&RepomdSection, ParseError> {
        self.sections
            .iter()
            .find(|s| s.section_type == section_type)
            .ok_or_else(|| ParseError::MissingSection(section_type.to_string()))
    }
}

#[derive(Default)]
struct SectionBuilder {
    section_type: String,
    location: Option<String>,
    checksum_type: Option<String>,
    checksum_value: Option<String>,
    size: Option<u64>,
}

impl SectionBuilder {
    fn build(self) -> Result<RepomdSection, ParseError> {
        Ok(RepomdSection {
            section_type: self.section_type,
            location: self.location.ok_or(ParseError::MissingElement {
                element: "location",
            })?,
            checksum: Checksum {
                algorithm: self.checksum_type.ok_or(ParseError::MissingElement {
                    element: "checksum",
                })?,
                value: self.checksum_value.ok_or(ParseError::MissingElement {
                    element: "checksum",
                })?,
            },
            size: self.size,
        })
    }
}

/// Parses repomd.xml.
///
/// # Errors
///
/// Returns a [`ParseError`] when the document is not well-formed XML or a
/// `<data>` section lacks its location or checksum.
pub fn parse_repomd(data: &[u8]) -> Result<Repomd, ParseError> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut revision = None;
    let mut sections = Vec::new();
    let mut section: Option<SectionBuilder> = None;
    let mut text_target: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.name().as_ref() {
                b"revision" => text_target = Some("revision"),
                b"data" => {
                    section = Some(SectionBuilder {
                        section_type: require_attribute(e, "data", "type")?,
                        ..SectionBuilder::default()
                    });
                }
                b"location" => {
                    if let Some(ref mut section) = section {
                        section.location = Some(require_attribute(e, "location", "href")?);
                    }
                }
                b"checksum" => {
                    if let Some(ref mut section) = section {
                        section.checksum_type = Some(require_attribute(e, "checksum", "type")?);
                        text_target = Some("checksum");
                    }
                }
                b"size" => text_target = Some("size"),
                _ => {}
            },
            Event::Text(ref t) => {
                let text = t.unescape()?.into_owned();
                match text_target {
                    Some("revision") => revision = Some(text),
                    Some("checksum") => {
                        if let Some(ref mut section) = section {
                            section.checksum_value = Some(text);
                        }
                    }
                    Some("size") => {
                        if let Some(ref mut section) = section {
                            let parsed = text
                                .parse()
                                .map_err(|_| ParseError::InvalidSize { value: text })?;
                            section.size = Some(parsed);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => {
                text_target = None;
                if e.name().as_ref() == b"data" {
                    if let Some(builder) = section.take() {
                        sections.push(builder.build()?);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(Repomd { revision, sections })
}
