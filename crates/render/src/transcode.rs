use std::io::Write;

/// HTML-to-PDF transcoding seam. Implementations are pure functions from an
/// HTML document to PDF bytes.
pub trait PdfEngine: Send + Sync {
    fn to_pdf(&self, html: &str) -> anyhow::Result<Vec<u8>>;
}

/// HTML-to-Markdown transcoding seam.
pub trait MarkdownEngine: Send + Sync {
    fn to_markdown(&self, html: &str) -> anyhow::Result<String>;
}

/// PdfEngine that pipes HTML through an external converter command reading
/// from stdin and writing PDF to stdout (e.g. `weasyprint - -`).
pub struct CommandPdf {
    program: String,
    args: Vec<String>,
}

impl CommandPdf {
    /// Build from a full command line, e.g. `weasyprint - -`.
    pub fn new(command_line: &str) -> anyhow::Result<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty PDF converter command"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl PdfEngine for CommandPdf {
    fn to_pdf(&self, html: &str) -> anyhow::Result<Vec<u8>> {
        use anyhow::Context;

        let mut child = std::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning PDF converter {}", self.program))?;

        child
            .stdin
            .take()
            .expect("stdin was piped")
            .write_all(html.as_bytes())
            .context("writing HTML to PDF converter")?;

        let output = child
            .wait_with_output()
            .context("waiting for PDF converter")?;
        anyhow::ensure!(
            output.status.success(),
            "PDF converter exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr),
        );
        Ok(output.stdout)
    }
}
