//! Streaming primary.xml parsing.
//!
//! The primary index of a large repository decompresses to hundreds of
//! megabytes, so it is consumed as an event stream and never held in
//! memory as a whole document.

use std::collections::HashSet;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use url::Url;

use crate::error::ParseError;
use crate::package::{Checksum, Package, RepoSnapshot};
use crate::xml::{attribute, require_attribute};

#[derive(Default)]
struct PackageBuilder {
    name: Option<String>,
    epoch: Option<String>,
    version: Option<String>,
    release: Option<String>,
    arch: Option<String>,
    relative_path: Option<String>,
    checksum_type: Option<String>,
    checksum_value: Option<String>,
    size: Option<u64>,
}

impl PackageBuilder {
    fn build(self) -> Result<Package, ParseError> {
        Ok(Package {
            name: self
                .name
                .ok_or(ParseError::MissingElement { element: "name" })?,
            // An absent epoch attribute means epoch zero in RPM terms.
            epoch: self.epoch.unwrap_or_else(|| "0".to_string()),
            version: self
                .version
                .ok_or(ParseError::MissingElement { element: "version" })?,
            release: self
                .release
                .ok_or(ParseError::MissingElement { element: "version" })?,
            arch: self
                .arch
                .ok_or(ParseError::MissingElement { element: "arch" })?,
            relative_path: self.relative_path.ok_or(ParseError::MissingElement {
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
            size: self
                .size
                .ok_or(ParseError::MissingElement { element: "size" })?,
        })
    }
}

fn version_attrs(e: &BytesStart, package: &mut Option<PackageBuilder>) -> Result<(), ParseError> {
    if let Some(package) = package {
        package.version = Some(require_attribute(e, "version", "ver")?);
        package.release = Some(require_attribute(e, "version", "rel")?);
        package.epoch = attribute(e, "epoch")?;
    }
    Ok(())
}

fn size_attr(e: &BytesStart, package: &mut Option<PackageBuilder>) -> Result<(), ParseError> {
    if let Some(package) = package {
        let value = require_attribute(e, "size", "package")?;
        let parsed = value
            .parse()
            .map_err(|_| ParseError::InvalidSize { value })?;
        package.size = Some(parsed);
    }
    Ok(())
}

fn location_attr(e: &BytesStart, package: &mut Option<PackageBuilder>) -> Result<(), ParseError> {
    if let Some(package) = package {
        package.relative_path = Some(require_attribute(e, "location", "href")?);
    }
    Ok(())
}

/// Parses a primary index into a snapshot.
///
/// # Arguments
///
/// * `data` - Decompressed primary.xml content
/// * `repository_url` - Base URL the package locations are relative to
/// * `index_revision` - Revision stamp from the accompanying repomd.xml
///
/// # Errors
///
/// Returns a [`ParseError`] when the document is malformed, a package
/// entry lacks a required field or the same location appears twice.
pub fn parse_primary<R: BufRead>(
    data: R,
    repository_url: &Url,
    index_revision: Option<String>,
) -> Result<RepoSnapshot, ParseError> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();
    let mut packages = Vec::new();
    let mut seen_paths = HashSet::new();
    let mut package: Option<PackageBuilder> = None;
    let mut text_target: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"package" => package = Some(PackageBuilder::default()),
                b"name" => {
                    if package.is_some() {
                        text_target = Some("name");
                    }
                }
                b"arch" => {
                    if package.is_some() {
                        text_target = Some("arch");
                    }
                }
                b"checksum" => {
                    if let Some(ref mut package) = package {
                        package.checksum_type = Some(require_attribute(e, "checksum", "type")?);
                        text_target = Some("checksum");
                    }
                }
                b"version" => version_attrs(e, &mut package)?,
                b"size" => size_attr(e, &mut package)?,
                b"location" => location_attr(e, &mut package)?,
                // The format subtree carries dependency data this tool
                // never needs. It dominates document size, so skip it
                // wholesale instead of walking its events.
                b"format" => {
                    reader.read_to_end_into(e.name(), &mut skip_buf)?;
                    skip_buf.clear();
                }
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"version" => version_attrs(e, &mut package)?,
                b"size" => size_attr(e, &mut package)?,
                b"location" => location_attr(e, &mut package)?,
                _ => {}
            },
            Event::Text(ref t) => {
                let text = t.unescape()?.into_owned();
                if let Some(ref mut package) = package {
                    match text_target {
                        Some("name") => package.name = Some(text),
                        Some("arch") => package.arch = Some(text),
                        Some("checksum") => package.checksum_value = Some(text),
                        _ => {}
                    }
                }
            }
            Event::End(ref e) => {
                text_target = None;
                if e.name().as_ref() == b"package" {
                    if let Some(builder) = package.take() {
                        let pkg = builder.build()?;
                        if !seen_paths.insert(pkg.relative_path.clone()) {
                            return Err(ParseError::DuplicatePath(pkg.relative_path));
                        }
                        packages.push(pkg);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(RepoSnapshot {
        repository_url: repository_url.to_string(),
        index_revision,
        packages,
    })
}
