use crate::base::error::WatchError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use tracing::debug;

/// Lines carrying the state tokens all start with this marker.
const HIDDEN_INPUT_PREFIX: &str = "<input type=\"hidden\"";

/// The hidden form fields the credential POST must echo back, keyed by the
/// names the login page uses.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoginFieldSet {
    /// `lt`: per-page session token.
    pub session_token: String,
    /// `dllt`: login method discriminator.
    pub auth_method: String,
    /// `execution`: flow execution token.
    pub execution: String,
    /// `_eventId`: submit event id.
    pub event_id: String,
    /// `rmShown`: remember-me widget flag.
    pub remember_shown: String,
    /// `pwdDefaultEncryptSalt`: key for the credential cipher; never echoed
    /// back in the POST.
    pub encrypt_salt: String,
}

type Setter = fn(&mut LoginFieldSet, String);

/// Static name→slot table; filled once per login attempt.
const FIELD_TABLE: &[(&str, Setter)] = &[
    ("lt", |fields, value| fields.session_token = value),
    ("dllt", |fields, value| fields.auth_method = value),
    ("execution", |fields, value| fields.execution = value),
    ("_eventId", |fields, value| fields.event_id = value),
    ("rmShown", |fields, value| fields.remember_shown = value),
    ("pwdDefaultEncryptSalt", |fields, value| {
        fields.encrypt_salt = value
    }),
];

impl LoginFieldSet {
    fn assign(&mut self, name: &str, value: String) -> Result<(), WatchError> {
        for (field, set) in FIELD_TABLE {
            if *field == name {
                set(self, value);
                return Ok(());
            }
        }
        Err(WatchError::MissingField {
            name: name.to_string(),
        })
    }
}

/// Scan the login page for its block of hidden `<input>` tags and collect
/// their values.
///
/// The scan skips forward to the first line starting with the hidden-input
/// marker, consumes consecutive marker lines, and stops at the first line
/// that no longer matches. Unknown field names are logged and skipped; a
/// document with no marker line at all is a parse failure.
pub fn extract_hidden_fields(body: &str) -> Result<LoginFieldSet, WatchError> {
    let mut fields = LoginFieldSet::default();
    let mut lines = body.lines().map(str::trim);

    let mut line = loop {
        match lines.next() {
            Some(candidate) if candidate.starts_with(HIDDEN_INPUT_PREFIX) => break candidate,
            Some(_) => continue,
            None => {
                return Err(WatchError::Parse(
                    "no hidden input fields in document".into(),
                ))
            }
        }
    };

    loop {
        let (name, value) = parse_input_tag(line)?;
        if let Err(err) = fields.assign(&name, value) {
            debug!(%err, "skipping hidden field");
        }
        match lines.next() {
            Some(next) if next.starts_with(HIDDEN_INPUT_PREFIX) => line = next,
            _ => break,
        }
    }
    Ok(fields)
}

/// Parse one `<input .../>` line into its (name-or-id, value) pair,
/// auto-closing the tag when the source omitted the trailing slash.
fn parse_input_tag(line: &str) -> Result<(String, String), WatchError> {
    let tag: Cow<'_, str> = if line.ends_with("/>") {
        Cow::Borrowed(line)
    } else if line.ends_with('>') {
        Cow::Owned(format!("{}/>", &line[..line.len() - 1]))
    } else {
        return Err(WatchError::Parse(format!("unterminated input tag: {line}")));
    };

    let mut reader = Reader::from_str(&tag);
    let mut name = String::new();
    let mut id = String::new();
    let mut value = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Empty(element)) => {
                for attr in element.attributes() {
                    let attr = attr
                        .map_err(|err| WatchError::Parse(format!("input tag attribute: {err}")))?;
                    let attr_value = attr
                        .unescape_value()
                        .map_err(|err| WatchError::Parse(format!("input tag value: {err}")))?
                        .into_owned();
                    match attr.key.as_ref() {
                        b"name" => name = attr_value,
                        b"id" => id = attr_value,
                        b"value" => value = attr_value,
                        _ => {}
                    }
                }
                break;
            }
            Ok(Event::Eof) => {
                return Err(WatchError::Parse(format!("input tag not self-closing: {line}")))
            }
            Ok(_) => continue,
            Err(err) => return Err(WatchError::Parse(format!("input tag: {err}"))),
        }
    }

    // some variants only carry an id attribute
    if name.is_empty() {
        name = id;
    }
    Ok((name, value))
}
