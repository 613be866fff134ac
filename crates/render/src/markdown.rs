use lazy_static::lazy_static;
use regex::Regex;
use tabular::Alignment;

use crate::MarkdownEngine;

/// The built-in HTML-to-Markdown transcoder. It understands the tag set the
/// stock templates emit; anything else is stripped to its text content.
#[derive(Debug, Default)]
pub struct TextMarkdown;

impl MarkdownEngine for TextMarkdown {
    fn to_markdown(&self, html: &str) -> anyhow::Result<String> {
        Ok(convert(html))
    }
}

lazy_static! {
    static ref STYLE_RE: Regex = Regex::new(r"(?s)<style[^>]*>.*?</style>").unwrap();
    static ref SCRIPT_RE: Regex = Regex::new(r"(?s)<script[^>]*>.*?</script>").unwrap();
    static ref TABLE_RE: Regex = Regex::new(r"(?s)<table[^>]*>.*?</table>").unwrap();
    static ref TR_RE: Regex = Regex::new(r"(?s)<tr[^>]*>(.*?)</tr>").unwrap();
    static ref CELL_RE: Regex = Regex::new(r"(?s)<(th|td)[^>]*>(.*?)</(?:th|td)>").unwrap();
    static ref HEADING_RE: Regex = Regex::new(r"(?s)<h([1-6])[^>]*>(.*?)</h[1-6]>").unwrap();
    static ref P_RE: Regex = Regex::new(r"(?s)<p[^>]*>(.*?)</p>").unwrap();
    static ref LI_RE: Regex = Regex::new(r"(?s)<li[^>]*>(.*?)</li>").unwrap();
    static ref A_RE: Regex = Regex::new(r#"(?s)<a[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).unwrap();
    static ref IMG_RE: Regex = Regex::new(r#"<img[^>]*src="([^"]*)"[^>]*/?>"#).unwrap();
    static ref BOLD_RE: Regex = Regex::new(r"(?s)<(?:strong|b)>(.*?)</(?:strong|b)>").unwrap();
    static ref EM_RE: Regex = Regex::new(r"(?s)<(?:em|i)>(.*?)</(?:em|i)>").unwrap();
    static ref BR_RE: Regex = Regex::new(r"<br\s*/?>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]+>").unwrap();
    static ref BLANKS_RE: Regex = Regex::new(r"\n{3,}").unwrap();
    static ref DELIMITER_ROW_RE: Regex = Regex::new(r"^\|(?: :?-+:? \|)+$").unwrap();
}

fn convert(html: &str) -> String {
    let mut text = STYLE_RE.replace_all(html, "").into_owned();
    text = SCRIPT_RE.replace_all(&text, "").into_owned();

    text = TABLE_RE
        .replace_all(&text, |caps: &regex::Captures| table_to_gfm(&caps[0]))
        .into_owned();

    text = HEADING_RE
        .replace_all(&text, |caps: &regex::Captures| {
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("\n{} {}\n", "#".repeat(level), caps[2].trim())
        })
        .into_owned();

    text = P_RE.replace_all(&text, "\n$1\n").into_owned();
    text = LI_RE.replace_all(&text, "\n- $1").into_owned();
    text = A_RE.replace_all(&text, "[$2]($1)").into_owned();
    text = IMG_RE.replace_all(&text, "![]($1)").into_owned();
    text = BOLD_RE.replace_all(&text, "**$1**").into_owned();
    text = EM_RE.replace_all(&text, "*$1*").into_owned();
    text = BR_RE.replace_all(&text, "\n").into_owned();
    text = TAG_RE.replace_all(&text, "").into_owned();

    text = unescape(&text);
    let trimmed: Vec<&str> = text.lines().map(str::trim).collect();
    let text = BLANKS_RE
        .replace_all(trimmed.join("\n").trim(), "\n\n")
        .into_owned();
    text + "\n"
}

/// Convert one `<table>` block to a GFM pipe table. The first row becomes
/// the header row and is followed by a plain `---` delimiter row; alignment
/// markers are applied afterwards from the table's stored alignments.
fn table_to_gfm(table_html: &str) -> String {
    let mut lines = Vec::new();
    for (index, row) in TR_RE.captures_iter(table_html).enumerate() {
        let cells: Vec<String> = CELL_RE
            .captures_iter(&row[1])
            .map(|c| unescape(TAG_RE.replace_all(c[2].trim(), "").as_ref()))
            .collect();
        if cells.is_empty() {
            continue;
        }
        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            lines.push(format!(
                "|{}|",
                cells.iter().map(|_| " --- ").collect::<Vec<_>>().join("|")
            ));
        }
    }
    format!("\n{}\n", lines.join("\n"))
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Rewrite the delimiter row of each GFM table in `markdown` with alignment
/// markers from the corresponding rendered table fragment, in order. Tables
/// without stored alignments keep plain `---` markers.
pub fn apply_gfm_alignments(markdown: &str, alignments: &[Option<Vec<Alignment>>]) -> String {
    let mut table_index = 0usize;
    let mut out = Vec::new();

    for line in markdown.lines() {
        if DELIMITER_ROW_RE.is_match(line) {
            let columns = line.matches('|').count().saturating_sub(1);
            let spec = alignments.get(table_index).and_then(Option::as_ref);
            table_index += 1;

            if let Some(spec) = spec {
                let markers: Vec<&str> = (0..columns)
                    .map(|i| spec.get(i).map(Alignment::gfm_marker).unwrap_or("---"))
                    .collect();
                out.push(format!("| {} |", markers.join(" | ")));
                continue;
            }
        }
        out.push(line.to_string());
    }
    out.join("\n")
}
