/*!
 * Console summary of a selection
 *
 * `status` and `export` print the largest selected files followed by the
 * totals, as tabled tables.
 */

use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::tokenizer::CacheStats;
use crate::utils::format_count;

/// Token count of one resolved file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTokens {
    /// Path shown to the user (relative to its root)
    pub path: String,
    /// Tokens counted
    pub tokens: usize,
}

/// Totals of one resolve/count pass
#[derive(Debug, Clone, Default)]
pub struct SelectionReport {
    /// Export destination, when the pass was an export
    pub output: Option<String>,
    /// Wall time of the pass
    pub duration: Duration,
    /// Explicit selection entries
    pub selections: usize,
    /// Files resolved
    pub files: usize,
    /// Token total
    pub tokens: usize,
    /// Token cache statistics
    pub cache: CacheStats,
    /// Per-file counts
    pub file_tokens: Vec<FileTokens>,
}

/// Above this many files only the largest are listed
const MAX_LISTED_FILES: usize = 15;

/// Rows kept when the list is cut down
const TOP_FILES: usize = 10;

/// Width the path column is shortened to
const PATH_WIDTH: usize = 60;

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "File")]
    path: String,
    #[tabled(rename = "Tokens")]
    tokens: String,
    #[tabled(rename = "Share")]
    share: String,
}

fn styled<R: Tabled>(rows: Vec<R>) -> String {
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Padding::new(1, 1, 0, 0))
        .with(Modify::new(Columns::new(..)).with(Alignment::left()));
    table.to_string()
}

/// Shorten `path` to at most `max_len` characters, keeping whole trailing
/// segments where possible
fn shorten_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let budget = max_len.saturating_sub(3);
    let mut kept: Vec<&str> = Vec::new();
    let mut used = 0;
    for segment in path.rsplit('/') {
        let cost = segment.chars().count() + 1;
        if used + cost > budget {
            break;
        }
        kept.push(segment);
        used += cost;
    }

    if kept.is_empty() {
        let chars: Vec<char> = path.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(budget)..].iter().collect();
        return format!("...{}", tail);
    }
    kept.reverse();
    format!(".../{}", kept.join("/"))
}

/// Console reporter
#[derive(Debug, Default, Clone, Copy)]
pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// Print the report to stdout
    pub fn print_report(&self, report: &SelectionReport) {
        println!("\n{}", self.generate_report(report));
    }

    /// Files table (when any) followed by the totals
    pub fn generate_report(&self, report: &SelectionReport) -> String {
        let summary = styled(self.summary_rows(report));
        if report.file_tokens.is_empty() {
            return format!("📊  SELECTION\n{}", summary);
        }

        let title = if report.file_tokens.len() > MAX_LISTED_FILES {
            format!("📋  TOP {} FILES BY TOKEN COUNT", TOP_FILES)
        } else {
            "📋  SELECTED FILES".to_string()
        };
        format!(
            "{}\n{}\n\n📊  SELECTION\n{}",
            title,
            styled(self.file_rows(report)),
            summary
        )
    }

    fn summary_rows(&self, report: &SelectionReport) -> Vec<SummaryRow> {
        let mut rows = Vec::new();
        if let Some(output) = &report.output {
            rows.push(SummaryRow {
                metric: "📂 Output",
                value: output.clone(),
            });
        }
        rows.extend([
            SummaryRow {
                metric: "⏱️ Time",
                value: format!("{:.2?}", report.duration),
            },
            SummaryRow {
                metric: "✅ Selected entries",
                value: format_count(report.selections),
            },
            SummaryRow {
                metric: "📄 Files",
                value: format_count(report.files),
            },
            SummaryRow {
                metric: "📦 Tokens",
                value: format_count(report.tokens),
            },
        ]);

        let lookups = report.cache.hits + report.cache.misses;
        if lookups > 0 {
            rows.push(SummaryRow {
                metric: "🔄 Token cache",
                value: format!(
                    "{:.1}% hits ({} of {}, {} cached)",
                    report.cache.hit_rate() * 100.0,
                    report.cache.hits,
                    lookups,
                    report.cache.entries
                ),
            });
        }
        rows
    }

    fn file_rows(&self, report: &SelectionReport) -> Vec<FileRow> {
        let mut files: Vec<&FileTokens> = report.file_tokens.iter().collect();
        files.sort_by(|a, b| b.tokens.cmp(&a.tokens).then_with(|| a.path.cmp(&b.path)));
        if files.len() > MAX_LISTED_FILES {
            files.truncate(TOP_FILES);
        }

        let total = report.tokens.max(1) as f64;
        files
            .into_iter()
            .map(|f| FileRow {
                path: shorten_path(&f.path, PATH_WIDTH),
                tokens: format_count(f.tokens),
                share: format!("{:.1}%", f.tokens as f64 * 100.0 / total),
            })
            .collect()
    }
}
