//! Registry document parser
//!
//! Extracts the domain of every entry from a document shaped like
//!
//! ```xml
//! <Rejestr>
//!   <PozycjaRejestru>
//!     <AdresDomeny>example.com</AdresDomeny>
//!     <!-- other child elements are ignored -->
//!   </PozycjaRejestru>
//! </Rejestr>
//! ```
//!
//! Element names come from [`RegistrySchema`] and are matched on their local
//! name, so a namespace prefix does not matter.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use sinkhole_core::{FetchError, RegistryEntry, RegistryList, RegistrySchema, is_renderable_domain};
use tracing::warn;

/// Parse a registry document into its list of entries
///
/// Entries without a usable domain are skipped with a warning. A domain is
/// usable when it is non-empty after trimming and contains no quote,
/// backslash, whitespace or control character. A
/// well-formed document without a single usable entry yields
/// [`FetchError::EmptyResult`].
pub fn parse_registry(xml: &str, schema: &RegistrySchema) -> Result<RegistryList, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = EntryCollector::new(schema);

    loop {
        let event = reader.read_event().map_err(|e| {
            FetchError::ParseFailure(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(e) => parser.open(e.local_name().as_ref())?,
            Event::Empty(e) => {
                parser.open(e.local_name().as_ref())?;
                parser.close();
            }
            Event::End(_) => parser.close(),
            Event::Text(text) => {
                if parser.in_domain() {
                    let text = text
                        .unescape()
                        .map_err(|e| FetchError::ParseFailure(e.to_string()))?;
                    parser.push_text(&text);
                }
            }
            Event::CData(data) => {
                if parser.in_domain() {
                    let text = std::str::from_utf8(&data)
                        .map_err(|e| FetchError::ParseFailure(e.to_string()))?;
                    parser.push_text(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    parser.finish()
}

/// Tracks where in the document the reader is
struct EntryCollector<'a> {
    schema: &'a RegistrySchema,
    depth: usize,
    seen_root: bool,
    in_entry: bool,
    in_domain: bool,
    domain: Option<String>,
    text: String,
    entries: Vec<RegistryEntry>,
    skipped: usize,
}

impl<'a> EntryCollector<'a> {
    fn new(schema: &'a RegistrySchema) -> Self {
        Self {
            schema,
            depth: 0,
            seen_root: false,
            in_entry: false,
            in_domain: false,
            domain: None,
            text: String::new(),
            entries: Vec::new(),
            skipped: 0,
        }
    }

    fn in_domain(&self) -> bool {
        self.in_domain
    }

    fn open(&mut self, name: &[u8]) -> Result<(), FetchError> {
        match self.depth {
            0 if self.seen_root => {
                return Err(FetchError::ParseFailure(
                    "more than one root element".to_string(),
                ));
            }
            0 if name != self.schema.root.as_bytes() => {
                return Err(FetchError::ParseFailure(format!(
                    "expected root element <{}>, found <{}>",
                    self.schema.root,
                    String::from_utf8_lossy(name)
                )));
            }
            0 => self.seen_root = true,
            1 if name == self.schema.entry.as_bytes() => {
                self.in_entry = true;
                self.domain = None;
            }
            2 if self.in_entry && name == self.schema.domain.as_bytes() => {
                self.in_domain = true;
                self.text.clear();
            }
            _ => {}
        }
        self.depth += 1;
        Ok(())
    }

    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);

        if self.in_domain && self.depth == 2 {
            self.in_domain = false;
            // A repeated domain element overwrites the earlier one
            self.domain = Some(self.text.trim().to_string());
        } else if self.in_entry && self.depth == 1 {
            self.in_entry = false;
            match self.domain.take() {
                Some(domain) if is_renderable_domain(&domain) => {
                    self.entries.push(RegistryEntry::new(domain))
                }
                Some(domain) if !domain.is_empty() => {
                    self.skipped += 1;
                    warn!(
                        "Skipping registry entry #{} with unusable <{}> {:?}",
                        self.entries.len() + self.skipped,
                        self.schema.domain,
                        domain
                    );
                }
                _ => {
                    self.skipped += 1;
                    warn!(
                        "Skipping registry entry #{} without <{}>",
                        self.entries.len() + self.skipped,
                        self.schema.domain
                    );
                }
            }
        }
    }

    fn finish(self) -> Result<RegistryList, FetchError> {
        if !self.seen_root {
            return Err(FetchError::ParseFailure(format!(
                "missing root element <{}>",
                self.schema.root
            )));
        }
        if self.depth != 0 {
            return Err(FetchError::ParseFailure(format!(
                "document ended inside <{}>",
                self.schema.root
            )));
        }
        if self.skipped > 0 {
            warn!("Skipped {} registry entries without a domain", self.skipped);
        }
        if self.entries.is_empty() {
            return Err(FetchError::EmptyResult);
        }
        Ok(RegistryList::new(self.entries))
    }
}
