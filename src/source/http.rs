use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{header, Client, StatusCode};
use scraper::{ElementRef, Html, Selector};

use crate::error::{Error, Result};
use crate::models::FetchedContent;
use crate::source::ContentSource;

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"\d{4}-\d{2}-\d{2}").expect("date pattern is valid");
    // "October 9, 2025" or "Oct. 9, 2025"
    static ref PROSE_DATE: Regex =
        Regex::new(r"([A-Za-z]{3,9})\.? (\d{1,2}), (\d{4})").expect("date pattern is valid");
    static ref US_DATE: Regex =
        Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("date pattern is valid");
}

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Scrapes government pages and their `/download` documents.
pub struct HttpContentSource {
    client: Client,
}

impl HttpContentSource {
    pub fn new() -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.client.get(url).send().await.map_err(|e| Error::SourceFetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        match response.status() {
            StatusCode::FORBIDDEN => Err(Error::Forbidden(url.to_string())),
            status if !status.is_success() => Err(Error::SourceFetch {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            }),
            _ => Ok(response),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<FetchedContent> {
        let html = self.get(url).await?.text().await?;
        let content = parse_page(&html);
        tracing::debug!(
            %url,
            chars = content.text.as_ref().map(|t| t.len()).unwrap_or(0),
            published = ?content.published_at,
            "Parsed page"
        );
        Ok(content)
    }

    async fn fetch_document(&self, url: &str) -> Result<FetchedContent> {
        // The date lives on the landing page, not in the file
        let landing = url.replace("/download", "");
        let published_at = match self.get(&landing).await {
            Ok(response) => {
                let html = response.text().await?;
                download_page_date(&Html::parse_document(&html))
            }
            Err(e) => {
                tracing::warn!(%url, "Could not read landing page: {}", e);
                None
            }
        };

        let bytes = self.get(url).await?.bytes().await?;
        let (filetype, text) = read_document(&bytes);
        if text.is_none() {
            tracing::info!(%url, %filetype, "No text extracted from document");
        }

        Ok(FetchedContent {
            text,
            filetype,
            published_at,
            meeting_at: None,
        })
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        if url.contains("/download") {
            self.fetch_document(url).await
        } else {
            self.fetch_page(url).await
        }
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_page(html: &str) -> FetchedContent {
    let document = Html::parse_document(html);
    FetchedContent {
        text: article_text(&document),
        filetype: "HTML".to_string(),
        published_at: published_date(&document),
        meeting_at: meeting_date(&document),
    }
}

fn article_text(document: &Html) -> Option<String> {
    let blocks = selector("h1, h2, h3, p, li");

    for root in ["main", "article", "#main-content", "body"] {
        let Some(container) = document.select(&selector(root)).next() else {
            continue;
        };
        let text = container
            .select(&blocks)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if !text.is_empty() {
            return Some(text);
        }
    }

    None
}

fn published_date(document: &Html) -> Option<NaiveDate> {
    if let Some(meta) = document
        .select(&selector(r#"meta[property="article:published_time"]"#))
        .next()
    {
        if let Some(date) = meta.value().attr("content").and_then(parse_loose_date) {
            return Some(date);
        }
    }

    for css in ["div.ma__press-status__date", "span.ma-page-header__published-date"] {
        if let Some(el) = document.select(&selector(css)).next() {
            if let Some(date) = parse_loose_date(&element_text(el)) {
                return Some(date);
            }
        }
    }

    document
        .select(&selector("time[datetime]"))
        .filter_map(|el| el.value().attr("datetime"))
        .find_map(parse_loose_date)
}

fn meeting_date(document: &Html) -> Option<NaiveDate> {
    document
        .select(&selector(r#"[itemprop="startDate"], meta[property="event:start_date"]"#))
        .filter_map(|el| el.value().attr("content").or_else(|| el.value().attr("datetime")))
        .find_map(parse_loose_date)
}

/// "Last updated" date from a document landing page: either a table row
/// header or a definition-list term.
pub fn download_page_date(document: &Html) -> Option<NaiveDate> {
    for (term, value) in [("th", "td"), ("dt", "dd")] {
        for label in document.select(&selector(term)) {
            if !element_text(label).to_lowercase().contains("last updated") {
                continue;
            }
            let sibling = label
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == value);
            if let Some(date) = sibling.and_then(|el| parse_loose_date(&element_text(el))) {
                return Some(date);
            }
        }
    }
    None
}

/// Accepts ISO timestamps and the prose dates government pages print
/// ("October 9, 2025", "Oct. 9, 2025", "10/09/2025").
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }

    if let Some(m) = ISO_DATE.find(raw) {
        if let Ok(date) = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d") {
            return Some(date);
        }
    }

    if let Some(caps) = PROSE_DATE.captures(raw) {
        let normalized = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
        if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%B %d %Y") {
            return Some(date);
        }
    }

    if let Some(caps) = US_DATE.captures(raw) {
        let (month, day, year) = (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

/// Identifies a downloaded file by its magic bytes. Only text formats yield
/// extracted text; binary office formats are recorded without it.
pub fn read_document(bytes: &[u8]) -> (String, Option<String>) {
    if bytes.starts_with(b"%PDF") {
        return ("PDF".to_string(), None);
    }
    if bytes.starts_with(b"PK\x03\x04") {
        return ("DOCX/XLSX".to_string(), None);
    }
    if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return ("XLS".to_string(), None);
    }

    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // Latin-1 maps every byte straight to a code point
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    };
    let text = text.trim();
    let text = (!text.is_empty()).then(|| text.to_string());
    ("CSV".to_string(), text)
}
