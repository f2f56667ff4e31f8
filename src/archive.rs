use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::types::{Editorial, EditorialSource, PipelineError, Result};

const SOURCES_MARKER: &str = "\n\n---\n\n## Sources\n\n";
const FOOTER_MARKER: &str = "\n*Editorial generated from ";

/// Append-only store of finished editorials, one dated markdown file
/// per run, named `YYYY-MM-DD_HH-MM.md` from the generation timestamp.
pub struct Archive {
    dir: PathBuf,
}

/// Metadata for one archived editorial, recovered from the filename and
/// the document's first line.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub title: String,
    pub timestamp: NaiveDateTime,
    pub path: PathBuf,
}

impl Archive {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .map_err(|e| PipelineError::Persistence(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    /// Write one editorial. Safe to call at most once per editorial;
    /// the dated filename makes a second write for the same minute an
    /// overwrite, which the composer never does.
    pub fn save(&self, editorial: &Editorial) -> Result<PathBuf> {
        let filename = editorial.generated_at.format("%Y-%m-%d_%H-%M.md").to_string();
        let path = self.dir.join(filename);
        let markdown = render_markdown(editorial);

        fs::write(&path, markdown)
            .map_err(|e| PipelineError::Persistence(format!("{}: {}", path.display(), e)))?;

        info!("Editorial archived to {}", path.display());
        Ok(path)
    }

    /// All archived editorials, newest first. Files that do not follow
    /// the naming scheme are skipped.
    pub fn list(&self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem,
                None => continue,
            };
            let timestamp = match NaiveDateTime::parse_from_str(
                &format!("{}_00", stem),
                "%Y-%m-%d_%H-%M_%S",
            ) {
                Ok(ts) => ts,
                Err(_) => {
                    debug!("Skipping non-editorial file {}", path.display());
                    continue;
                }
            };

            let title = match fs::read_to_string(&path) {
                Ok(text) => text
                    .lines()
                    .next()
                    .and_then(|line| line.strip_prefix("# "))
                    .unwrap_or("Untitled")
                    .to_string(),
                Err(e) => {
                    warn!("Could not read {}: {}", path.display(), e);
                    continue;
                }
            };

            entries.push(ArchiveEntry { title, timestamp, path });
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    pub fn load(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }
}

/// Render an editorial as the archived markdown document.
pub fn render_markdown(editorial: &Editorial) -> String {
    let date_str = editorial.generated_at.format("%A, %B %d, %Y at %H:%M");

    let mut md = format!("# {}\n\n*{}*\n\n---\n\n", editorial.title, date_str);
    md.push_str(&editorial.body);
    md.push_str(SOURCES_MARKER);

    for source in &editorial.sources {
        if source.link.is_empty() {
            md.push_str(&format!("- **{}** - *{}*\n\n", source.title, source.source_name));
        } else {
            md.push_str(&format!(
                "- **{}** - *{}*  \n  [{}]({})\n\n",
                source.title, source.source_name, source.link, source.link
            ));
        }
    }

    md.push_str(&format!(
        "{}{} articles*\n",
        FOOTER_MARKER, editorial.article_count
    ));
    md
}

/// Recover title, body and the ordered source list from an archived
/// document. Inverse of [`render_markdown`]; body and sources come back
/// byte-for-byte.
pub fn parse_markdown(text: &str) -> Option<(String, String, Vec<EditorialSource>)> {
    let title = text.lines().next()?.strip_prefix("# ")?.to_string();

    let body_start = text.find("\n\n---\n\n")? + "\n\n---\n\n".len();
    let sources_at = text.rfind(SOURCES_MARKER)?;
    let body = text.get(body_start..sources_at)?.to_string();

    let after = &text[sources_at + SOURCES_MARKER.len()..];
    let sources_end = after.find(FOOTER_MARKER).unwrap_or(after.len());
    let sources_text = &after[..sources_end];

    let mut sources = Vec::new();
    let mut lines = sources_text.lines().peekable();
    while let Some(line) = lines.next() {
        let Some(rest) = line.strip_prefix("- **") else {
            continue;
        };
        let split = rest.find("** - *")?;
        let title = rest[..split].to_string();
        let source_name = rest[split + "** - *".len()..]
            .trim_end()
            .strip_suffix('*')?
            .to_string();

        let link = match lines.peek() {
            Some(next) if next.trim_start().starts_with('[') => {
                let next = lines.next()?.trim_start();
                let end = next.find("](")?;
                next[1..end].to_string()
            }
            _ => String::new(),
        };

        sources.push(EditorialSource { title, source_name, link });
    }

    Some((title, body, sources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn editorial() -> Editorial {
        Editorial {
            title: "Your Morning News".to_string(),
            generated_at: Utc.with_ymd_and_hms(2026, 8, 24, 8, 5, 0).unwrap(),
            body: "The day opens with two stories.\n\nBoth matter.".to_string(),
            sources: vec![
                EditorialSource {
                    title: "First story".to_string(),
                    source_name: "Feed One".to_string(),
                    link: "https://one.example/a".to_string(),
                },
                EditorialSource {
                    title: "Second story".to_string(),
                    source_name: "Feed Two".to_string(),
                    link: String::new(),
                },
            ],
            article_count: 2,
        }
    }

    #[test]
    fn markdown_round_trips_body_and_sources_exactly() {
        let editorial = editorial();
        let markdown = render_markdown(&editorial);
        let (title, body, sources) = parse_markdown(&markdown).unwrap();

        assert_eq!(title, editorial.title);
        assert_eq!(body, editorial.body);
        assert_eq!(sources, editorial.sources);
    }

    #[test]
    fn save_list_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path().to_path_buf()).unwrap();
        let editorial = editorial();

        let path = archive.save(&editorial).unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("2026-08-24_08-05.md")
        );

        let entries = archive.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Your Morning News");

        let text = archive.load(&entries[0].path).unwrap();
        let (_, body, sources) = parse_markdown(&text).unwrap();
        assert_eq!(body, editorial.body);
        assert_eq!(sources, editorial.sources);
    }

    #[test]
    fn list_is_newest_first_and_skips_strays() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path().to_path_buf()).unwrap();

        let mut older = editorial();
        older.generated_at = Utc.with_ymd_and_hms(2026, 8, 23, 20, 0, 0).unwrap();
        archive.save(&older).unwrap();
        archive.save(&editorial()).unwrap();
        std::fs::write(dir.path().join("notes.md"), "# not an editorial").unwrap();
        std::fs::write(dir.path().join("stray.txt"), "junk").unwrap();

        let entries = archive.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].timestamp > entries[1].timestamp);
    }
}
