use comrak::{
    Arena, format_html,
    nodes::{AstNode, ListType, NodeValue, TableAlignment},
    parse_document,
};

use crate::application::render::types::RenderError;

use super::config::{DOCUMENT_STYLES, document_sanitizer, markdown_options};

/// Local markdown renderer producing standalone HTML and LaTeX documents.
pub(crate) struct MarkdownRenderer {
    options: comrak::Options<'static>,
    sanitizer: ammonia::Builder<'static>,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub(crate) fn new() -> Self {
        Self {
            options: markdown_options(),
            sanitizer: document_sanitizer(),
        }
    }

    /// Sanitized HTML body for `markdown`.
    pub(crate) fn html_fragment(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        let mut html = String::new();
        format_html(root, &self.options, &mut html)
            .map_err(|err| RenderError::markdown(err.to_string()))?;
        Ok(self.sanitizer.clean(&html).to_string())
    }

    /// Full HTML5 document with an escaped title and embedded styles.
    pub(crate) fn html_document(&self, markdown: &str, title: &str) -> Result<String, RenderError> {
        let body = self.html_fragment(markdown)?;
        let title = escape_html(title);
        Ok(format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{title}</title>\n<style>\n{DOCUMENT_STYLES}\n</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
        ))
    }

    /// Standalone LaTeX article. `title` is omitted from the preamble when empty.
    pub(crate) fn latex_document(&self, markdown: &str, title: &str) -> String {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let mut writer = LatexWriter::default();
        writer.node(root);

        let mut out = String::from(
            "\\documentclass{article}\n\
             \\usepackage[utf8]{inputenc}\n\
             \\usepackage[T1]{fontenc}\n\
             \\usepackage[normalem]{ulem}\n\
             \\usepackage{hyperref}\n",
        );
        let title = title.trim();
        if !title.is_empty() {
            out.push_str(&format!("\\title{{{}}}\n\\date{{}}\n", escape_latex(title)));
        }
        out.push_str("\\begin{document}\n");
        if !title.is_empty() {
            out.push_str("\\maketitle\n");
        }
        out.push('\n');
        out.push_str(writer.out.trim_end());
        out.push_str("\n\n\\end{document}\n");
        out
    }
}

#[derive(Default)]
struct LatexWriter {
    out: String,
}

impl LatexWriter {
    fn node<'a>(&mut self, node: &'a AstNode<'a>) {
        let data = node.data.borrow();
        match &data.value {
            NodeValue::Heading(heading) => {
                let command = match heading.level {
                    1 => "section",
                    2 => "subsection",
                    3 => "subsubsection",
                    4 => "paragraph",
                    _ => "subparagraph",
                };
                self.out.push_str(&format!("\\{command}{{"));
                self.children(node);
                self.out.push_str("}\n\n");
            }
            NodeValue::Paragraph => {
                self.children(node);
                self.out.push_str("\n\n");
            }
            NodeValue::Text(text) => self.out.push_str(&escape_latex(text)),
            NodeValue::SoftBreak => self.out.push('\n'),
            NodeValue::LineBreak => self.out.push_str("\\\\\n"),
            NodeValue::Emph => self.wrap(node, "\\emph{", "}"),
            NodeValue::Strong => self.wrap(node, "\\textbf{", "}"),
            NodeValue::Strikethrough => self.wrap(node, "\\sout{", "}"),
            NodeValue::Superscript => self.wrap(node, "\\textsuperscript{", "}"),
            NodeValue::Code(code) => {
                self.out.push_str("\\texttt{");
                self.out.push_str(&escape_latex(&code.literal));
                self.out.push('}');
            }
            NodeValue::CodeBlock(block) => {
                self.out.push_str("\\begin{verbatim}\n");
                self.out.push_str(&block.literal);
                if !block.literal.ends_with('\n') {
                    self.out.push('\n');
                }
                self.out.push_str("\\end{verbatim}\n\n");
            }
            NodeValue::BlockQuote => self.wrap(node, "\\begin{quote}\n", "\\end{quote}\n\n"),
            NodeValue::List(list) => {
                let environment = match list.list_type {
                    ListType::Bullet => "itemize",
                    ListType::Ordered => "enumerate",
                };
                self.out.push_str(&format!("\\begin{{{environment}}}\n"));
                self.children(node);
                self.out.push_str(&format!("\\end{{{environment}}}\n\n"));
            }
            NodeValue::Item(_) | NodeValue::TaskItem(..) => {
                self.out.push_str("\\item ");
                self.children(node);
                self.trim_blank_lines();
                self.out.push('\n');
            }
            NodeValue::Link(link) | NodeValue::Image(link) => {
                self.out
                    .push_str(&format!("\\href{{{}}}{{", escape_url(&link.url)));
                self.children(node);
                self.out.push('}');
            }
            NodeValue::ThematicBreak => {
                self.out
                    .push_str("\\noindent\\rule{\\linewidth}{0.4pt}\n\n");
            }
            NodeValue::Table(table) => {
                let columns: String = table
                    .alignments
                    .iter()
                    .map(|alignment| match alignment {
                        TableAlignment::Center => "c|",
                        TableAlignment::Right => "r|",
                        _ => "l|",
                    })
                    .collect();
                self.out
                    .push_str(&format!("\\begin{{tabular}}{{|{columns}}}\n\\hline\n"));
                self.children(node);
                self.out.push_str("\\end{tabular}\n\n");
            }
            NodeValue::TableRow(_) => {
                for (index, cell) in node.children().enumerate() {
                    if index > 0 {
                        self.out.push_str(" & ");
                    }
                    self.node(cell);
                }
                self.out.push_str(" \\\\\n\\hline\n");
            }
            NodeValue::HtmlBlock(_) | NodeValue::HtmlInline(_) | NodeValue::FrontMatter(_) => {}
            _ => self.children(node),
        }
    }

    fn children<'a>(&mut self, node: &'a AstNode<'a>) {
        for child in node.children() {
            self.node(child);
        }
    }

    fn wrap<'a>(&mut self, node: &'a AstNode<'a>, open: &str, close: &str) {
        self.out.push_str(open);
        self.children(node);
        self.out.push_str(close);
    }

    fn trim_blank_lines(&mut self) {
        let trimmed = self.out.trim_end_matches('\n').len();
        self.out.truncate(trimmed);
    }
}

pub(crate) fn escape_latex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\textbackslash{}"),
            '{' | '}' | '$' | '&' | '#' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '~' => escaped.push_str("\\textasciitilde{}"),
            '^' => escaped.push_str("\\textasciicircum{}"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_url(url: &str) -> String {
    url.replace('\\', "/")
        .replace('%', "\\%")
        .replace('#', "\\#")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_document_wraps_sanitized_body() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .html_document(
                "# Hello\n\n<script>alert(1)</script>\n\n| a | b |\n|---|---|\n| 1 | 2 |\n",
                "Tom & Jerry",
            )
            .expect("html renders");

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Tom &amp; Jerry</title>"));
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<table>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn latex_document_maps_structure() {
        let renderer = MarkdownRenderer::new();
        let latex = renderer.latex_document(
            "# Costs & Fees\n\nPay **50%** of `a_b`.\n\n- one\n- two\n\n1. first\n",
            "Q1 Report",
        );

        assert!(latex.starts_with("\\documentclass{article}"));
        assert!(latex.contains("\\title{Q1 Report}"));
        assert!(latex.contains("\\maketitle"));
        assert!(latex.contains("\\section{Costs \\& Fees}"));
        assert!(latex.contains("\\textbf{50\\%}"));
        assert!(latex.contains("\\texttt{a\\_b}"));
        assert!(latex.contains("\\begin{itemize}\n\\item one\n\\item two\n\\end{itemize}"));
        assert!(latex.contains("\\begin{enumerate}"));
        assert!(latex.trim_end().ends_with("\\end{document}"));
    }

    #[test]
    fn latex_without_title_skips_maketitle() {
        let latex = MarkdownRenderer::new().latex_document("text", "  ");
        assert!(!latex.contains("\\maketitle"));
        assert!(!latex.contains("\\title{"));
    }

    #[test]
    fn code_blocks_stay_verbatim() {
        let latex = MarkdownRenderer::new().latex_document("```\nlet x = {1};\n```\n", "");
        assert!(latex.contains("\\begin{verbatim}\nlet x = {1};\n\\end{verbatim}"));
    }

    #[test]
    fn escape_covers_reserved_characters() {
        assert_eq!(
            escape_latex("\\ ~ ^ $"),
            "\\textbackslash{} \\textasciitilde{} \\textasciicircum{} \\$"
        );
    }
}
