use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{Category, IsNew, PersistedRecord, RecordFilter, RecordUpdate};
use crate::storage::RecordStore;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteStore {
    conn: Connection,
    table: String,
}

/// `<prefix>_YYYY_MM_DD`, restricted to characters that are safe as an identifier.
pub fn table_name_for(prefix: &str, date: NaiveDate) -> String {
    sanitize_table_name(&format!("{}_{}", prefix, date.format("%Y_%m_%d")))
}

fn sanitize_table_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P, table: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            table: sanitize_table_name(table),
        };
        store.init_db()?;
        tracing::info!("Table '{}' is ready", store.table);
        Ok(store)
    }

    pub fn in_memory(table: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            table: sanitize_table_name(table),
        };
        store.init_db()?;
        Ok(store)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn init_db(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                lastmodified TEXT,
                filetype TEXT,
                page_date TEXT,
                is_new TEXT CHECK(is_new IN ('yes', 'no', 'maybe')),
                category TEXT,
                summary TEXT,
                extracted_text TEXT,
                content_hash TEXT,
                excluded TEXT CHECK(excluded IS NULL OR excluded = 'yes'),
                processed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_{table}_is_new ON {table}(is_new);
            "#,
            table = self.table
        ))?;

        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<PersistedRecord> {
        let page_date: Option<String> = row.get(3)?;
        let is_new: Option<String> = row.get(4)?;
        let category: Option<String> = row.get(5)?;
        let excluded: Option<String> = row.get(9)?;

        Ok(PersistedRecord {
            url: row.get(0)?,
            lastmodified: row.get(1)?,
            filetype: row.get(2)?,
            page_date: page_date.and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok()),
            is_new: is_new.as_deref().map(IsNew::from).unwrap_or(IsNew::No),
            category: category.map(Category::from),
            summary: row.get(6)?,
            extracted_text: row.get(7)?,
            content_hash: row.get(8)?,
            excluded: excluded.as_deref() == Some("yes"),
        })
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

impl RecordStore for SqliteStore {
    fn exists(&self, url: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE url = ?1", self.table),
            params![url],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert(&self, record: &PersistedRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                r#"
                INSERT INTO {} (url, lastmodified, filetype, page_date, is_new, category, summary, extracted_text, content_hash, excluded)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                self.table
            ),
            params![
                record.url,
                record.lastmodified,
                record.filetype,
                format_date(record.page_date),
                record.is_new.as_str(),
                record.category.as_ref().map(|c| c.to_string()),
                record.summary,
                record.extracted_text,
                record.content_hash,
                if record.excluded { Some("yes") } else { None },
            ],
        )?;
        Ok(())
    }

    fn update(&self, url: &str, update: RecordUpdate) -> Result<()> {
        let changed = match update {
            RecordUpdate::Rescraped {
                extracted_text,
                filetype,
                page_date,
                is_new,
            } => {
                let hash = extracted_text.as_deref().map(crate::storage::content_hash);
                self.conn.execute(
                    &format!(
                        r#"
                        UPDATE {} SET extracted_text = ?1, content_hash = ?2, filetype = ?3,
                            page_date = ?4, is_new = ?5, processed_at = CURRENT_TIMESTAMP
                        WHERE url = ?6
                        "#,
                        self.table
                    ),
                    params![
                        extracted_text,
                        hash,
                        filetype,
                        format_date(page_date),
                        is_new.as_str(),
                        url
                    ],
                )?
            }
            RecordUpdate::Classified { category, summary } => self.conn.execute(
                &format!(
                    "UPDATE {} SET category = ?1, summary = ?2, processed_at = CURRENT_TIMESTAMP WHERE url = ?3",
                    self.table
                ),
                params![category.to_string(), summary, url],
            )?,
            RecordUpdate::Rehashed { content_hash } => self.conn.execute(
                &format!("UPDATE {} SET content_hash = ?1 WHERE url = ?2", self.table),
                params![content_hash, url],
            )?,
            RecordUpdate::Excluded => self.conn.execute(
                &format!("UPDATE {} SET excluded = 'yes' WHERE url = ?1", self.table),
                params![url],
            )?,
        };

        if changed == 0 {
            return Err(Error::RecordNotFound(url.to_string()));
        }
        Ok(())
    }

    fn fetch_by_predicate(&self, filter: RecordFilter) -> Result<Vec<PersistedRecord>> {
        let predicate = match filter {
            RecordFilter::ReportEligible => "is_new IN ('yes', 'maybe') AND excluded IS NULL",
            // Binary documents never yield text, so re-fetching them is pointless
            RecordFilter::NeedsScrapeRetry => {
                r#"(extracted_text IS NULL OR TRIM(extracted_text) = '') AND excluded IS NULL
                   AND (filetype IS NULL OR filetype IN ('HTML', 'CSV'))"#
            }
            RecordFilter::NeedsLlmRetry => {
                r#"extracted_text IS NOT NULL AND TRIM(extracted_text) <> ''
                   AND excluded IS NULL
                   AND is_new IN ('yes', 'maybe')
                   AND (summary IS NULL OR category IS NULL OR category IN ('API Error', 'Parse Error'))"#
            }
            RecordFilter::All => "1 = 1",
        };

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT url, lastmodified, filetype, page_date, is_new, category, summary,
                   extracted_text, content_hash, excluded
            FROM {}
            WHERE {}
            ORDER BY id
            "#,
            self.table, predicate
        ))?;

        let records = stmt.query_map([], Self::row_to_record)?;
        records.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchResult;

    fn store() -> SqliteStore {
        SqliteStore::in_memory("govfeed_2025_10_11").unwrap()
    }

    fn record(url: &str, is_new: IsNew, text: Option<&str>) -> PersistedRecord {
        let mut record = PersistedRecord::new(url, Some("2025-10-10T12:00:00Z".to_string()));
        record.is_new = is_new;
        record.filetype = Some("HTML".to_string());
        record.set_extracted_text(text.map(str::to_string));
        record
    }

    #[test]
    fn test_table_name_is_sanitized() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 11).unwrap();
        assert_eq!(table_name_for("govfeed", date), "govfeed_2025_10_11");
        assert_eq!(table_name_for("gov-feed; DROP", date), "gov_feed__DROP_2025_10_11");
    }

    #[test]
    fn test_insert_and_exists() {
        let store = store();
        assert!(!store.exists("https://example.gov/a").unwrap());
        store.insert(&record("https://example.gov/a", IsNew::Yes, Some("text"))).unwrap();
        assert!(store.exists("https://example.gov/a").unwrap());
    }

    #[test]
    fn test_duplicate_url_is_rejected() {
        let store = store();
        let r = record("https://example.gov/a", IsNew::Yes, Some("text"));
        store.insert(&r).unwrap();
        assert!(matches!(store.insert(&r), Err(Error::Database(_))));
    }

    #[test]
    fn test_record_round_trip() {
        let store = store();
        let mut r = record("https://example.gov/a", IsNew::Maybe, Some("Body text"));
        r.page_date = NaiveDate::from_ymd_opt(2025, 10, 9);
        r.apply_result(&BatchResult::new("https://example.gov/a", Category::MeetingMaterials, "Minutes."));
        store.insert(&r).unwrap();

        let all = store.fetch_by_predicate(RecordFilter::All).unwrap();
        assert_eq!(all, vec![r]);
    }

    #[test]
    fn test_report_eligible_skips_excluded_and_old() {
        let store = store();
        store.insert(&record("https://example.gov/new", IsNew::Yes, Some("a"))).unwrap();
        store.insert(&record("https://example.gov/old", IsNew::No, Some("b"))).unwrap();
        store.insert(&record("https://example.gov/maybe", IsNew::Maybe, Some("c"))).unwrap();
        store.update("https://example.gov/maybe", RecordUpdate::Excluded).unwrap();

        let urls: Vec<_> = store
            .fetch_by_predicate(RecordFilter::ReportEligible)
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(urls, vec!["https://example.gov/new"]);
    }

    #[test]
    fn test_scrape_retry_predicate_and_rescrape_update() {
        let store = store();
        store.insert(&record("https://example.gov/empty", IsNew::No, None)).unwrap();
        store.insert(&record("https://example.gov/full", IsNew::Yes, Some("a"))).unwrap();
        let mut pdf = record("https://example.gov/doc/b/download", IsNew::Yes, None);
        pdf.filetype = Some("PDF".to_string());
        store.insert(&pdf).unwrap();

        let pending = store.fetch_by_predicate(RecordFilter::NeedsScrapeRetry).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, "https://example.gov/empty");

        store
            .update(
                "https://example.gov/empty",
                RecordUpdate::Rescraped {
                    extracted_text: Some("recovered".to_string()),
                    filetype: Some("PDF".to_string()),
                    page_date: None,
                    is_new: IsNew::Yes,
                },
            )
            .unwrap();

        assert!(store.fetch_by_predicate(RecordFilter::NeedsScrapeRetry).unwrap().is_empty());
        let updated = store
            .fetch_by_predicate(RecordFilter::All)
            .unwrap()
            .into_iter()
            .find(|r| r.url == "https://example.gov/empty")
            .unwrap();
        assert_eq!(updated.content_hash, Some(crate::storage::content_hash("recovered")));
        assert_eq!(updated.filetype.as_deref(), Some("PDF"));
    }

    #[test]
    fn test_llm_retry_predicate() {
        let store = store();
        let mut failed = record("https://example.gov/failed", IsNew::Yes, Some("a"));
        failed.apply_result(&BatchResult::api_error("https://example.gov/failed", "quota"));
        let mut done = record("https://example.gov/done", IsNew::Yes, Some("b"));
        done.apply_result(&BatchResult::new("https://example.gov/done", Category::PressRelease, "ok"));
        let unsummarized = record("https://example.gov/unsummarized", IsNew::Maybe, Some("c"));
        let no_text = record("https://example.gov/no-text", IsNew::Yes, None);
        let not_new = record("https://example.gov/not-new", IsNew::No, Some("d"));

        for r in [&failed, &done, &unsummarized, &no_text, &not_new] {
            store.insert(r).unwrap();
        }

        let urls: Vec<_> = store
            .fetch_by_predicate(RecordFilter::NeedsLlmRetry)
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(
            urls,
            vec!["https://example.gov/failed", "https://example.gov/unsummarized"]
        );
    }

    #[test]
    fn test_classified_update_keeps_exclusion() {
        let store = store();
        store.insert(&record("https://example.gov/a", IsNew::Yes, Some("a"))).unwrap();
        store.update("https://example.gov/a", RecordUpdate::Excluded).unwrap();
        store
            .update(
                "https://example.gov/a",
                RecordUpdate::Classified {
                    category: Category::PressRelease,
                    summary: "s".to_string(),
                },
            )
            .unwrap();

        let all = store.fetch_by_predicate(RecordFilter::All).unwrap();
        assert!(all[0].excluded);
        assert_eq!(all[0].category, Some(Category::PressRelease));
    }

    #[test]
    fn test_update_missing_record_errors() {
        let store = store();
        let err = store.update("https://example.gov/missing", RecordUpdate::Excluded);
        assert!(matches!(err, Err(Error::RecordNotFound(_))));
    }
}
