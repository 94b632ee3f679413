use chrono::NaiveDate;
use reqwest::Client;

use crate::error::{Error, Result};
use crate::models::FeedEntry;

/// Fills the `{date}` placeholder of the feed template with `YYYY-MM-DD`.
pub fn feed_location(format: &str, date: NaiveDate) -> String {
    format.replace("{date}", &date.format("%Y-%m-%d").to_string())
}

/// Reads the daily feed from an HTTP(S) URL or a local path.
pub async fn load_feed(client: &Client, location: &str) -> Result<Vec<FeedEntry>> {
    let text = if location.starts_with("http://") || location.starts_with("https://") {
        let response = client.get(location).send().await?;
        if !response.status().is_success() {
            return Err(Error::SourceFetch {
                url: location.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        response.text().await?
    } else {
        tokio::fs::read_to_string(location).await?
    };

    let entries = parse_feed_csv(&text);
    tracing::info!("Loaded {} feed entries from {}", entries.len(), location);
    Ok(entries)
}

/// Two columns, `loc,lastmod`, with a header row. Rows without a URL are
/// skipped.
pub fn parse_feed_csv(text: &str) -> Vec<FeedEntry> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let fields = split_row(line);
            let url = fields.first().map(|u| u.trim()).filter(|u| !u.is_empty())?;
            if !url.starts_with("http") {
                tracing::debug!("Skipping malformed feed row: {}", line);
                return None;
            }
            let lastmodified = fields
                .get(1)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            Some(FeedEntry::new(url, lastmodified))
        })
        .collect()
}

/// Splits one CSV row on commas outside double quotes. `""` inside a quoted
/// field is a literal quote.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
