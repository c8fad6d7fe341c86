//! Markdown rendering for external write paths.
//!
//! External collaborators hand the engine markdown in two places: overwrite
//! payloads and suggestion candidates. The engine itself only speaks markup,
//! so markdown is rendered to HTML first.

/// Convert markdown to HTML using comrak.
#[cfg(feature = "markdown")]
pub fn markdown_to_html(markdown: &str) -> String {
    use comrak::{Options, markdown_to_html};

    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.r#unsafe = true; // Allow raw HTML

    markdown_to_html(markdown, &options)
}

#[cfg(all(test, feature = "markdown"))]
mod tests {
    use super::*;

    #[test]
    fn test_renders_basic_blocks() {
        let html = markdown_to_html("# Title\n\nbody **bold**\n");
        assert!(html.contains("<h1>"));
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn test_strikethrough_extension_enabled() {
        let html = markdown_to_html("~~gone~~");
        assert!(html.contains("<del>") || html.contains("<s>"));
    }
}
