mod engine;
mod markdown;
mod transcode;

pub use engine::{ProxyDocument, RenderOutput, RenderedBody, RenderingEngine};
pub use markdown::{apply_gfm_alignments, TextMarkdown};
pub use transcode::{CommandPdf, MarkdownEngine, PdfEngine};
