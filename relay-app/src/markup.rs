use pulldown_cmark::{Options, Parser, html};

/// Render completion text to the HTML markup the host stores for messages.
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(text, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::render_markdown;

    #[test]
    fn bold_markdown_renders_to_strong_markup() {
        assert_eq!(render_markdown("**hi**"), "<p><strong>hi</strong></p>\n");
    }

    #[test]
    fn plain_text_is_wrapped_in_a_paragraph() {
        assert_eq!(render_markdown("hello"), "<p>hello</p>\n");
    }

    #[test]
    fn lists_survive_rendering() {
        let out = render_markdown("- one\n- two");
        assert!(out.contains("<ul>"));
        assert!(out.contains("<li>one</li>"));
    }
}
