use anyhow::{Context, Result};
use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

/// Fixed style block embedded verbatim into every exported document.
pub const STYLE_SHEET: &str = "<style>body{font-family:Arial,sans-serif;line-height:1.6;margin:40px;color:#333}h1{color:#2c3e50;border-bottom:2px solid #3498db;padding-bottom:10px}h2{color:#34495e;margin-top:30px;border-left:4px solid #3498db;padding-left:15px}h3{color:#7f8c8d;margin-top:25px}code{background-color:#f8f9fa;padding:2px 4px;border-radius:3px;font-family:'Courier New',monospace}pre{background-color:#f8f9fa;padding:15px;border-radius:5px;border-left:4px solid #3498db;overflow-x:auto}table{border-collapse:collapse;width:100%;margin:20px 0}th,td{border:1px solid #ddd;padding:12px;text-align:left}th{background-color:#f2f2f2;font-weight:bold}nav.toc{background-color:#f8f9fa;border:1px solid #ddd;border-radius:5px;padding:10px 20px}nav.toc ul{list-style:none;padding-left:0}nav.toc li.toc-h2{padding-left:20px}nav.toc li.toc-h3{padding-left:40px}</style>";

/// Converts markdown to a styled PDF through an external HTML renderer.
pub struct DocumentExporter {
    renderer: Vec<String>,
}

impl DocumentExporter {
    pub fn new(renderer: Vec<String>) -> Self {
        Self { renderer }
    }

    /// Markdown body to HTML: tables, fenced code with language classes,
    /// heading anchors, and a contents block where the source says `[TOC]`.
    pub fn markdown_to_html(markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);

        // First pass collects heading text so anchors and the TOC agree.
        let mut headings: Vec<(HeadingLevel, String)> = Vec::new();
        let mut current: Option<(HeadingLevel, String)> = None;
        for event in Parser::new_ext(markdown, options) {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    current = Some((level, String::new()));
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(heading) = current.take() {
                        headings.push(heading);
                    }
                }
                Event::Text(text) | Event::Code(text) => {
                    if let Some((_, buf)) = current.as_mut() {
                        buf.push_str(&text);
                    }
                }
                _ => {}
            }
        }
        let slugs = assign_slugs(&headings);

        let mut index = 0usize;
        let events = Parser::new_ext(markdown, options).map(|event| match event {
            Event::Start(Tag::Heading {
                level,
                classes,
                attrs,
                ..
            }) => {
                let slug = slugs.get(index).cloned().unwrap_or_default();
                index += 1;
                Event::Start(Tag::Heading {
                    level,
                    id: Some(CowStr::from(slug)),
                    classes,
                    attrs,
                })
            }
            other => other,
        });

        let mut body = String::with_capacity(markdown.len() * 2);
        html::push_html(&mut body, events);

        if body.contains("<p>[TOC]</p>") {
            body = body.replace("<p>[TOC]</p>", &render_toc(&headings, &slugs));
        }
        body
    }

    pub fn wrap_document(body: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>Generated Document</title>{STYLE_SHEET}</head><body>{body}</body></html>"
        )
    }

    /// Renders markdown to a PDF byte stream. The byte stream is returned
    /// only when the renderer exits cleanly; nothing is written to disk.
    pub async fn to_pdf(&self, markdown: &str) -> Result<Vec<u8>> {
        let document = Self::wrap_document(&Self::markdown_to_html(markdown));

        let (program, args) = self
            .renderer
            .split_first()
            .context("PDF renderer command is empty")?;
        info!(renderer = %program, "rendering document to PDF");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to launch PDF renderer '{program}'"))?;

        let mut stdin = child
            .stdin
            .take()
            .context("PDF renderer stdin unavailable")?;
        if let Err(err) = stdin.write_all(document.as_bytes()).await {
            // A renderer that died early reports through its exit status below.
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(err).context("failed to stream document to PDF renderer");
            }
        }
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("failed to wait for PDF renderer")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("PDF renderer failed ({}): {}", output.status, stderr.trim());
        }

        Ok(output.stdout)
    }
}

fn assign_slugs(headings: &[(HeadingLevel, String)]) -> Vec<String> {
    let mut seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    headings
        .iter()
        .map(|(_, text)| {
            let base = slugify(text);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{}-{}", base, *count - 1)
            }
        })
        .collect()
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

fn render_toc(headings: &[(HeadingLevel, String)], slugs: &[String]) -> String {
    let mut out = String::from("<nav class=\"toc\"><ul>");
    for ((level, text), slug) in headings.iter().zip(slugs) {
        let depth = *level as usize;
        if depth > 3 {
            continue;
        }
        out.push_str(&format!(
            "<li class=\"toc-h{}\"><a href=\"#{}\">{}</a></li>",
            depth,
            slug,
            escape_html(text)
        ));
    }
    out.push_str("</ul></nav>");
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_document_starts_with_doctype_and_carries_the_style_block() {
        let html = DocumentExporter::wrap_document("<p>hi</p>");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(STYLE_SHEET));
        assert!(html.ends_with("</body></html>"));
    }

    #[test]
    fn markdown_tables_and_fenced_code_render() {
        let markdown = "| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n";
        let body = DocumentExporter::markdown_to_html(markdown);
        assert!(body.contains("<table>"));
        assert!(body.contains("language-rust"));
    }

    #[test]
    fn headings_get_anchor_ids() {
        let body = DocumentExporter::markdown_to_html("# Executive Summary\n\n## Risk Areas\n");
        assert!(body.contains("id=\"executive-summary\""));
        assert!(body.contains("id=\"risk-areas\""));
    }

    #[test]
    fn toc_marker_expands_to_contents_block() {
        let body =
            DocumentExporter::markdown_to_html("[TOC]\n\n# One\n\n## Two\n\ntext\n\n# One\n");
        assert!(body.contains("<nav class=\"toc\">"));
        assert!(body.contains("<a href=\"#one\">One</a>"));
        assert!(body.contains("<a href=\"#two\">Two</a>"));
        // duplicate headings stay addressable
        assert!(body.contains("<a href=\"#one-1\">One</a>"));
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  "), "section");
    }

    #[tokio::test]
    async fn to_pdf_returns_renderer_stdout() {
        let exporter = DocumentExporter::new(vec!["cat".to_string()]);
        let bytes = exporter.to_pdf("# Title").await.unwrap();
        let echoed = String::from_utf8(bytes).unwrap();
        assert!(echoed.starts_with("<!DOCTYPE html>"));
        assert!(echoed.contains("<h1 id=\"title\">Title</h1>"));
    }

    #[tokio::test]
    async fn to_pdf_surfaces_renderer_stderr_on_failure() {
        let exporter = DocumentExporter::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat >/dev/null; echo render exploded >&2; exit 3".to_string(),
        ]);
        let err = exporter.to_pdf("# Title").await.unwrap_err();
        assert!(err.to_string().contains("render exploded"));
    }
}
