use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use tracknote_extractors::{ExtractError, Provider, ProviderRegistry, ResolveError};

use crate::api::ThreadMessage;

/// One successfully extracted and resolved link. At most one per message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedLink {
    pub title: String,
    pub url: String,
    pub provider: Provider,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
enum LinkParseError {
    #[error("url extraction: {0}")]
    Extract(#[from] ExtractError),
    #[error("title resolution: {0}")]
    Resolve(#[from] ResolveError),
}

/// The summary artifact: a semicolon-delimited CSV held in memory for the
/// duration of one upload. Header plus one row per parsed link, one column
/// per provider; a header-only artifact is a valid result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryArtifact {
    filename: String,
    bytes: Vec<u8>,
    row_count: usize,
}

impl SummaryArtifact {
    fn build(channel_id: &str, thread_ts: &str, columns: &[Provider], links: &[ParsedLink]) -> Self {
        let mut out = String::new();

        let mut header: Vec<String> = vec!["Title".to_owned()];
        header.extend(columns.iter().map(|provider| provider.column_label().to_owned()));
        push_row(&mut out, &header);

        for link in links {
            let mut row: Vec<String> = vec![link.title.clone()];
            row.extend(columns.iter().map(|provider| {
                if *provider == link.provider {
                    link.url.clone()
                } else {
                    String::new()
                }
            }));
            push_row(&mut out, &row);
        }

        Self {
            filename: format!("{channel_id}-{thread_ts}.csv"),
            bytes: out.into_bytes(),
            row_count: links.len(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Data rows, excluding the header.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn push_row(out: &mut String, fields: &[String]) {
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            out.push(';');
        }
        push_field(out, field);
    }
    out.push('\n');
}

// Quoting per RFC 4180 with a semicolon delimiter: fields containing the
// delimiter, a quote, or a line break are wrapped and quotes doubled.
fn push_field(out: &mut String, field: &str) {
    let needs_quoting = field.contains([';', '"', '\n', '\r']);
    if !needs_quoting {
        out.push_str(field);
        return;
    }

    out.push('"');
    for ch in field.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}

/// Walks an ordered reply list, extracting and resolving one music link
/// per message. A message that yields no link, an ambiguous link, or a
/// failed title lookup is skipped; the artifact is built from whatever
/// subset survived, in the original order.
pub struct ThreadSummarizer {
    registry: Arc<ProviderRegistry>,
}

impl ThreadSummarizer {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub async fn summarize(
        &self,
        messages: &[ThreadMessage],
        channel_id: &str,
        thread_ts: &str,
    ) -> SummaryArtifact {
        debug!(channel_id, thread_ts, replies = messages.len(), "processing thread");

        let mut links = Vec::new();
        for message in messages {
            match self.parse_message(&message.text).await {
                Ok(link) => links.push(link),
                Err(reason) => {
                    warn!(
                        channel_id,
                        thread_ts,
                        user = %message.user,
                        error = %reason,
                        "skipping reply without a usable music link"
                    );
                }
            }
        }

        let columns: Vec<Provider> = self.registry.providers().collect();
        SummaryArtifact::build(channel_id, thread_ts, &columns, &links)
    }

    async fn parse_message(&self, text: &str) -> Result<ParsedLink, LinkParseError> {
        let (url, provider) = self.registry.extract(text)?;
        let title = self.registry.resolve(provider, &url).await?;
        Ok(ParsedLink { title, url, provider })
    }
}
