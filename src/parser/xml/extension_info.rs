use crate::extension::{ExtensionInfo, Screen, ROOT_TAG, SCREEN_TAG};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Extension manifest errors
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Malformed manifest: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Malformed attribute: {0}")]
    Attribute(#[from] AttrError),
}

/// Attribute values buffered from the last `<screen>` open
#[derive(Debug, Default)]
struct PendingScreen {
    name: Option<String>,
    view: Option<String>,
}

/// Parser for extension manifests registered under the extension meta-data key.
///
/// ```xml
/// <mpt-extension name="Qibla" author="Example">
///     <screen name="Compass" view="com.example.qibla.CompassView" />
/// </mpt-extension>
/// ```
pub struct ExtensionInfoParser;

impl ExtensionInfoParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a manifest stream for `package_name`.
    ///
    /// Returns `None` when there is no stream or the stream cannot be read
    /// to the end as well-formed XML. Every screen in the result is owned by
    /// `package_name`.
    pub fn parse<R: BufRead>(&self, package_name: &str, stream: Option<R>) -> Option<ExtensionInfo> {
        let Some(stream) = stream else {
            trace!("No manifest stream for {}", package_name);
            return None;
        };

        match self.parse_stream(package_name, stream) {
            Ok(info) => {
                debug!(
                    "Parsed extension manifest of {}: {} screens",
                    package_name,
                    info.screens.len()
                );
                Some(info)
            }
            Err(e) => {
                warn!("Error parsing extension manifest of {}: {}", package_name, e);
                None
            }
        }
    }

    fn parse_stream<R: BufRead>(
        &self,
        package_name: &str,
        stream: R,
    ) -> Result<ExtensionInfo, ManifestError> {
        let mut info = ExtensionInfo::new();
        let mut root_seen = false;
        // Cleared by every screen close
        let mut pending = PendingScreen::default();
        let mut depth = 0usize;

        let mut reader = Reader::from_reader(stream);
        reader.trim_text(true);

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    if let Some(screen) = self.open_tag(e, &mut info, &mut root_seen)? {
                        pending = screen;
                        depth += 1;
                    }
                }
                Event::Empty(ref e) => {
                    // A self-closing screen opens and closes in one event
                    if let Some(screen) = self.open_tag(e, &mut info, &mut root_seen)? {
                        info.screens.push(commit(package_name, screen));
                        pending = PendingScreen::default();
                    }
                }
                Event::End(ref e) => {
                    if e.name().as_ref() == SCREEN_TAG.as_bytes() {
                        depth = depth.saturating_sub(1);
                        info.screens
                            .push(commit(package_name, std::mem::take(&mut pending)));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if depth > 0 {
            debug!(
                "Manifest of {} ended with {} unclosed screens",
                package_name, depth
            );
        }

        Ok(info)
    }

    /// Handle an opening tag, returning the buffered values if it is a screen
    fn open_tag(
        &self,
        e: &BytesStart,
        info: &mut ExtensionInfo,
        root_seen: &mut bool,
    ) -> Result<Option<PendingScreen>, ManifestError> {
        let tag = e.name();

        if tag.as_ref() == ROOT_TAG.as_bytes() {
            if !*root_seen {
                info.name = attribute(e, "name")?;
                info.author = attribute(e, "author")?;
                *root_seen = true;
            }
            return Ok(None);
        }

        if tag.as_ref() == SCREEN_TAG.as_bytes() {
            return Ok(Some(PendingScreen {
                name: attribute(e, "name")?,
                view: attribute(e, "view")?,
            }));
        }

        Ok(None)
    }
}

impl Default for ExtensionInfoParser {
    fn default() -> Self {
        Self::new()
    }
}

fn commit(package_name: &str, screen: PendingScreen) -> Screen {
    Screen::new(package_name, screen.name, screen.view)
}

/// Look up an unprefixed attribute and unescape its value
fn attribute(e: &BytesStart, key: &str) -> Result<Option<String>, ManifestError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
