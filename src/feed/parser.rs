//! Single-pass RSS parser.
//!
//! Every element is classified by its own name plus the names of its parent
//! and grandparent. Children of `<channel>` fill the document fields, and an
//! `<item>` under `<channel>` opens a new episode that its direct children
//! fill until the matching end tag appends it to the episode list. Anything
//! else is ignored.

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::date::xml_date_to_date;
use super::types::{EpisodeResponse, FeedDocument};

/// SEC-003: Maximum element nesting depth accepted from a feed.
const MAX_FEED_DEPTH: usize = 256;

/// Errors that can occur while parsing feed XML.
///
/// A parse error means the whole document is rejected; partial documents
/// are never returned.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The bytes are not well-formed XML.
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// An attribute value could not be decoded.
    #[error("invalid attribute value: {0}")]
    Attribute(String),

    /// The document contains no element at all.
    #[error("document has no root element")]
    NoRootElement,

    /// The document ended while elements were still open.
    #[error("document ended with {0} unclosed element(s)")]
    Truncated(usize),

    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

#[derive(Debug, Clone, Copy)]
enum ChannelField {
    Title,
    Description,
    Summary,
    PubDate,
}

#[derive(Debug, Clone, Copy)]
enum EpisodeField {
    Title,
    Description,
    Duration,
    Guid,
    PubDate,
    Link,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Channel(ChannelField),
    Episode(EpisodeField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    /// Direct child of an `<item>` that is itself a child of `<channel>`
    Item,
    /// Direct child of `<channel>`
    Channel,
    Other,
}

/// Text being collected for one field element, including its descendants.
struct Capture {
    target: Target,
    depth: usize,
    text: String,
}

/// The `<item>` currently being filled and the stack depth it was opened at.
struct OpenEpisode {
    depth: usize,
    episode: EpisodeResponse,
}

#[derive(Default)]
struct FeedState {
    doc: FeedDocument,
    /// Names of the currently open elements, outermost first
    stack: Vec<String>,
    current_episode: Option<OpenEpisode>,
    capture: Option<Capture>,
    last_pub_date: Option<String>,
    saw_root: bool,
}

/// Parses raw feed bytes into a [`FeedDocument`].
///
/// Text is decoded using the encoding named by a byte order mark or the
/// XML declaration, UTF-8 otherwise.
///
/// # Errors
///
/// Returns [`ParseError`] for malformed XML, an empty document, a document
/// truncated before its elements close, or excessive nesting.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut state = FeedState::default();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(&reader, e))?;
        let decoder = reader.decoder();

        match event {
            Event::Start(e) => {
                let name = element_name(&e, decoder);
                state.open(name.clone(), &e, decoder, false)?;
                state.stack.push(name);
                if state.stack.len() > MAX_FEED_DEPTH {
                    return Err(ParseError::MaxDepthExceeded(MAX_FEED_DEPTH));
                }
            }
            Event::Empty(e) => {
                let name = element_name(&e, decoder);
                state.open(name.clone(), &e, decoder, true)?;
            }
            Event::End(_) => {
                state.stack.pop();
                state.close();
            }
            Event::Text(t) => {
                if let Some(capture) = state.capture.as_mut() {
                    let text = t.unescape().map_err(|e| xml_error(&reader, e))?;
                    capture.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(capture) = state.capture.as_mut() {
                    let text = c
                        .decode()
                        .map_err(|e| xml_error(&reader, e.into()))?;
                    capture.text.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    state.finish()
}

impl FeedState {
    /// Handles an opening (or self-closing) tag. `name` is not yet on the stack.
    fn open(
        &mut self,
        name: String,
        e: &BytesStart<'_>,
        decoder: Decoder,
        self_closing: bool,
    ) -> Result<(), ParseError> {
        self.saw_root = true;

        let depth = self.stack.len();
        let context = self.context();

        if name == "channel" {
            self.doc.episodes.get_or_insert_with(Vec::new);
        }

        // Field text already being captured swallows nested markup
        if self.capture.is_some() {
            return Ok(());
        }

        let target = match context {
            Context::Item => {
                if name == "enclosure" {
                    if let Some(open) = self.current_episode.as_mut() {
                        read_enclosure(e, decoder, &mut open.episode)?;
                    }
                    return Ok(());
                }
                episode_field(&name).map(Target::Episode)
            }
            Context::Channel => {
                if name == "item" {
                    self.open_episode(depth);
                    if self_closing {
                        self.close_episode();
                    }
                    return Ok(());
                }
                channel_field(&name).map(Target::Channel)
            }
            Context::Other => None,
        };

        if let Some(target) = target {
            let capture = Capture {
                target,
                depth,
                text: String::new(),
            };
            if self_closing {
                self.commit(capture);
            } else {
                self.capture = Some(capture);
            }
        }
        Ok(())
    }

    /// Where a newly opened element sits, judged by its parent and grandparent.
    fn context(&self) -> Context {
        let mut ancestors = self.stack.iter().rev().map(String::as_str);
        match (ancestors.next(), ancestors.next()) {
            (Some("item"), Some("channel")) => Context::Item,
            (Some("channel"), _) => Context::Channel,
            _ => Context::Other,
        }
    }

    /// Handles an end tag after its element has been popped off the stack.
    fn close(&mut self) {
        let depth = self.stack.len();

        if self.capture.as_ref().is_some_and(|c| c.depth == depth) {
            if let Some(capture) = self.capture.take() {
                self.commit(capture);
            }
            return;
        }

        if self
            .current_episode
            .as_ref()
            .is_some_and(|open| open.depth == depth)
        {
            self.close_episode();
        }
    }

    fn open_episode(&mut self, depth: usize) {
        // A well-formed document closes every item before the next one opens
        self.close_episode();
        self.current_episode = Some(OpenEpisode {
            depth,
            episode: EpisodeResponse::default(),
        });
    }

    fn close_episode(&mut self) {
        if let Some(open) = self.current_episode.take() {
            self.doc
                .episodes
                .get_or_insert_with(Vec::new)
                .push(open.episode);
        }
    }

    fn commit(&mut self, capture: Capture) {
        let value = capture.text.trim().to_string();
        match capture.target {
            Target::Channel(field) => match field {
                ChannelField::Title => self.doc.title = value,
                ChannelField::Description => self.doc.description = value,
                ChannelField::Summary => self.doc.summary = value,
                ChannelField::PubDate => self.last_pub_date = Some(value),
            },
            Target::Episode(field) => {
                let Some(open) = self.current_episode.as_mut() else {
                    return;
                };
                let episode = &mut open.episode;
                let slot = match field {
                    EpisodeField::Title => &mut episode.title,
                    EpisodeField::Description => &mut episode.description,
                    EpisodeField::Duration => &mut episode.duration,
                    EpisodeField::Guid => &mut episode.guid,
                    EpisodeField::PubDate => &mut episode.pub_date,
                    EpisodeField::Link => &mut episode.link,
                };
                *slot = Some(value);
            }
        }
    }

    fn finish(mut self) -> Result<FeedDocument, ParseError> {
        if !self.stack.is_empty() {
            return Err(ParseError::Truncated(self.stack.len()));
        }
        if !self.saw_root {
            return Err(ParseError::NoRootElement);
        }
        self.doc.last_updated = xml_date_to_date(self.last_pub_date.as_deref());
        Ok(self.doc)
    }
}

fn channel_field(name: &str) -> Option<ChannelField> {
    match name {
        "title" => Some(ChannelField::Title),
        "description" => Some(ChannelField::Description),
        "itunes:summary" => Some(ChannelField::Summary),
        "pubDate" => Some(ChannelField::PubDate),
        _ => None,
    }
}

fn episode_field(name: &str) -> Option<EpisodeField> {
    match name {
        "title" => Some(EpisodeField::Title),
        "description" => Some(EpisodeField::Description),
        "itunes:duration" => Some(EpisodeField::Duration),
        "guid" => Some(EpisodeField::Guid),
        "pubDate" => Some(EpisodeField::PubDate),
        "link" => Some(EpisodeField::Link),
        _ => None,
    }
}

/// Copies the `url` and `type` attributes of an `<enclosure>`.
fn read_enclosure(
    e: &BytesStart<'_>,
    decoder: Decoder,
    episode: &mut EpisodeResponse,
) -> Result<(), ParseError> {
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(err) => {
                tracing::warn!(error = %err, "Skipping malformed enclosure attribute");
                continue;
            }
        };
        let slot = match attr.key.as_ref() {
            b"url" => &mut episode.media_url,
            b"type" => &mut episode.mime_type,
            _ => continue,
        };
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|err| ParseError::Attribute(err.to_string()))?;
        *slot = Some(value.into_owned());
    }
    Ok(())
}

fn element_name(e: &BytesStart<'_>, decoder: Decoder) -> String {
    match decoder.decode(e.name().as_ref()) {
        Ok(name) => name.into_owned(),
        Err(_) => String::from_utf8_lossy(e.name().as_ref()).into_owned(),
    }
}

fn xml_error(reader: &Reader<&[u8]>, err: quick_xml::Error) -> ParseError {
    ParseError::Xml {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}
