use scraper::{Html, Node};

/// Elements that force a line break around their content.
fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "li"
            | "ul"
            | "ol"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
            | "table"
            | "tr"
            | "article"
            | "section"
            | "figure"
    )
}

/// Convert an HTML fragment to normalized plain text: tags stripped, block
/// boundaries preserved as newlines, script and style content dropped.
/// Plain-text input passes through with whitespace normalized.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Element(element) => {
                let name = element.name();
                if name == "br" {
                    out.push('\n');
                } else if is_block(name) && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Node::Text(text) => {
                let ignored = node
                    .parent()
                    .and_then(|parent| parent.value().as_element())
                    .map(|element| matches!(element.name(), "script" | "style"))
                    .unwrap_or(false);
                if !ignored {
                    // Newlines inside text nodes are markup formatting, not
                    // paragraph breaks.
                    out.push_str(&text.replace(['\n', '\r', '\t'], " "));
                }
            }
            _ => {}
        }
    }

    normalize_lines(&out)
}

fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
