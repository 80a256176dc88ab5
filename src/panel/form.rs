use std::collections::BTreeMap;

use super::{DnsRecord, RecordInput, RecordType, AUTO_TTL};

/// TTL used when a new record is created, and in place of "automatic" when editing.
pub const DEFAULT_TTL: u32 = 3600;
pub const MIN_TTL: u32 = 60;

/// Preset TTLs offered by the editor, in seconds.
pub const TTL_PRESETS: [(u32, &str); 6] = [
    (60, "1 minute"),
    (300, "5 minutes"),
    (1800, "30 minutes"),
    (3600, "1 hour"),
    (14400, "4 hours"),
    (86400, "1 day"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Name,
    Content,
    Ttl,
}

/// Add/edit form for a single record.
///
/// Values are kept as the user typed them. Validation runs on [`RecordForm::submit`] and
/// every violated field gets one message; editing a field clears its message.
#[derive(Debug, Clone)]
pub struct RecordForm {
    record_type: RecordType,
    name: String,
    content: String,
    ttl: String,
    proxied: bool,
    errors: BTreeMap<Field, String>,
}

impl Default for RecordForm {
    fn default() -> Self {
        Self {
            record_type: RecordType::A,
            name: String::new(),
            content: String::new(),
            ttl: DEFAULT_TTL.to_string(),
            proxied: false,
            errors: BTreeMap::new(),
        }
    }
}

impl RecordForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the form from an existing record. Returns `None` for record types
    /// the editor does not handle.
    pub fn edit(record: &DnsRecord) -> Option<Self> {
        let record_type = record.kind()?;
        let ttl = if record.ttl == AUTO_TTL {
            DEFAULT_TTL
        } else {
            record.ttl
        };

        Some(Self {
            record_type,
            name: record.name.clone(),
            content: record.content.clone(),
            ttl: ttl.to_string(),
            proxied: record.proxied.unwrap_or(false),
            errors: BTreeMap::new(),
        })
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn ttl(&self) -> &str {
        &self.ttl
    }

    pub fn proxied(&self) -> bool {
        self.proxied
    }

    pub fn set_type(&mut self, record_type: RecordType) {
        self.record_type = record_type;
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.errors.remove(&Field::Name);
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.errors.remove(&Field::Content);
    }

    pub fn set_ttl(&mut self, ttl: impl Into<String>) {
        self.ttl = ttl.into();
        self.errors.remove(&Field::Ttl);
    }

    pub fn set_proxied(&mut self, proxied: bool) {
        self.proxied = proxied;
    }

    pub fn errors(&self) -> &BTreeMap<Field, String> {
        &self.errors
    }

    pub fn error(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    /// Validates the form and, if every rule holds, builds the payload to send.
    pub fn submit(&mut self) -> Option<RecordInput> {
        self.errors = self.validate();
        if !self.errors.is_empty() {
            return None;
        }

        let ttl = self.ttl.trim().parse().ok()?;
        Some(RecordInput {
            record_type: self.record_type,
            name: self.name.clone(),
            content: self.content.clone(),
            ttl,
            proxied: self.record_type.is_proxiable().then_some(self.proxied),
        })
    }

    fn validate(&self) -> BTreeMap<Field, String> {
        let mut errors = BTreeMap::new();

        if self.name.trim().is_empty() {
            errors.insert(Field::Name, "Record name is required".to_string());
        }

        if self.content.trim().is_empty() {
            errors.insert(Field::Content, "Record content is required".to_string());
        } else if let Some(message) = check_content(self.record_type, &self.content) {
            errors.insert(Field::Content, message.to_string());
        }

        match self.ttl.trim().parse::<u32>() {
            Ok(ttl) if ttl < MIN_TTL => {
                errors.insert(Field::Ttl, format!("TTL must be at least {} seconds", MIN_TTL));
            }
            Ok(_) => {}
            Err(_) => {
                errors.insert(Field::Ttl, "TTL must be a whole number of seconds".to_string());
            }
        }

        errors
    }
}

fn check_content(record_type: RecordType, content: &str) -> Option<&'static str> {
    match record_type {
        RecordType::A if !is_dotted_quad(content) => Some("Enter a valid IPv4 address"),
        RecordType::Aaaa if !content.contains(':') => Some("Enter a valid IPv6 address"),
        RecordType::Cname if content.chars().any(char::is_whitespace) => {
            Some("CNAME target must not contain whitespace")
        }
        _ => None,
    }
}

/// Four groups of one to three digits. Octet ranges are left to the upstream.
fn is_dotted_quad(content: &str) -> bool {
    let groups: Vec<&str> = content.split('.').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()))
}
