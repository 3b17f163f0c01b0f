//! Label lookup over a parsed detail page.
//!
//! Detail pages are label/value tables with no stable ids, so each value is
//! found by trying an ordered list of strategies. Each strategy is a pure
//! function of (page, label).
//!
//! `PageModel` wraps a `scraper::Html`, which is not `Send`; build it and
//! drop it between awaits.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::text::squash_whitespace;

lazy_static! {
    static ref TD: Selector = Selector::parse("td").unwrap();
    static ref TR: Selector = Selector::parse("tr").unwrap();
    static ref SPAN: Selector = Selector::parse("span").unwrap();
    static ref LABEL_CELLS: Selector = Selector::parse("span, td, th").unwrap();
}

/// Elements that start a new line in rendered text.
const BLOCK_TAGS: &[&str] = &[
    "br", "div", "p", "tr", "li", "table", "tbody", "ul", "ol", "h1", "h2", "h3", "h4", "h5",
    "h6",
];

/// A parsed detail page.
pub struct PageModel {
    document: Html,
}

impl PageModel {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }
}

/// One way of finding the value next to a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Second cell of a row in which some span/td/th mentions the label.
    /// Case-sensitive.
    AdjacentCell,
    /// First cell of a row whose span mentions the label, with the label
    /// prefix stripped. Case-sensitive.
    LabelPrefixedCell,
    /// Row whose header cell mentions the label; the following cell, or the
    /// rest of the row. Case-insensitive.
    RowHeader,
    /// First text node mentioning the label; the rest of its element, its
    /// next sibling, or the next cell-like element. Case-insensitive.
    TextNode,
}

/// Strategies that need the rendered page.
pub const RENDERED_TIERS: &[LookupStrategy] =
    &[LookupStrategy::AdjacentCell, LookupStrategy::LabelPrefixedCell];

/// Strategies that work on any HTML, rendered or fetched.
pub const STATIC_TIERS: &[LookupStrategy] = &[LookupStrategy::RowHeader, LookupStrategy::TextNode];

impl LookupStrategy {
    /// Non-empty value for `label`, if this strategy finds one.
    pub fn lookup(self, page: &PageModel, label: &str) -> Option<String> {
        let value = match self {
            Self::AdjacentCell => adjacent_cell(&page.document, label),
            Self::LabelPrefixedCell => label_prefixed_cell(&page.document, label),
            Self::RowHeader => row_header(&page.document, label),
            Self::TextNode => text_node(&page.document, label),
        };
        value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }
}

/// First non-empty hit across `strategies`, in order.
pub fn lookup_cascade(
    page: &PageModel,
    label: &str,
    strategies: &[LookupStrategy],
) -> Option<String> {
    strategies.iter().find_map(|s| s.lookup(page, label))
}

fn adjacent_cell(document: &Html, label: &str) -> Option<String> {
    // First qualifying cell in document order, even across nested tables
    for td in document.select(&TD) {
        let Some(row) = parent_row(td) else { continue };
        if td_position(row, td) != Some(1) {
            continue;
        }
        let labelled = row
            .select(&LABEL_CELLS)
            .any(|cell| normalized_text(cell).contains(label));
        if labelled {
            return Some(inner_text(td));
        }
    }
    None
}

fn label_prefixed_cell(document: &Html, label: &str) -> Option<String> {
    for td in document.select(&TD) {
        let Some(row) = parent_row(td) else { continue };
        if td_position(row, td) != Some(0) {
            continue;
        }
        if row
            .select(&SPAN)
            .any(|span| normalized_text(span).contains(label))
        {
            return Some(strip_label(&inner_text(td), label));
        }
    }
    None
}

fn row_header(document: &Html, label: &str) -> Option<String> {
    let needle = label.to_lowercase();
    for row in document.select(&TR) {
        let cells: Vec<_> = child_elements(row)
            .filter(|e| matches!(e.value().name(), "td" | "th"))
            .collect();
        let Some(first) = cells.first() else { continue };

        let header = joined_text(*first);
        if header.is_empty() || !header.to_lowercase().contains(&needle) {
            continue;
        }
        return match cells.get(1) {
            Some(value) => Some(joined_text(*value)),
            None => Some(joined_text(row).replace(&header, "")),
        };
    }
    None
}

fn text_node(document: &Html, label: &str) -> Option<String> {
    let needle = label.to_lowercase();
    let parent = document.root_element().descendants().find_map(|node| {
        let text = node.value().as_text()?;
        if !text.to_lowercase().contains(&needle) {
            return None;
        }
        let parent = node.parent().and_then(ElementRef::wrap)?;
        (!matches!(parent.value().name(), "script" | "style")).then_some(parent)
    })?;

    let text = joined_text(parent);
    let cleaned = strip_label(&text, label);
    if !cleaned.is_empty() && cleaned != text {
        return Some(cleaned);
    }

    if let Some(sibling) = parent.next_siblings().find_map(ElementRef::wrap) {
        return Some(joined_text(sibling));
    }

    // Next cell-like element in document order, descendants included
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .skip_while(|e| e.id() != parent.id())
        .skip(1)
        .find(|e| matches!(e.value().name(), "td" | "div" | "span"))
        .map(joined_text)
}

fn parent_row(td: ElementRef<'_>) -> Option<ElementRef<'_>> {
    td.parent()
        .and_then(ElementRef::wrap)
        .filter(|p| p.value().name() == "tr")
}

/// Index of `td` among the `td` children of `row`.
fn td_position(row: ElementRef<'_>, td: ElementRef<'_>) -> Option<usize> {
    child_elements(row)
        .filter(|e| e.value().name() == "td")
        .position(|e| e.id() == td.id())
}

fn child_elements(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    el.children().filter_map(ElementRef::wrap)
}

/// Remove a leading `label` and optional colon, case-insensitively.
fn strip_label(text: &str, label: &str) -> String {
    match Regex::new(&format!(r"(?i)^\s*{}\s*:?\s*", regex::escape(label))) {
        Ok(prefix) => prefix.replace(text, "").trim().to_string(),
        Err(_) => text.trim().to_string(),
    }
}

fn normalized_text(el: ElementRef<'_>) -> String {
    squash_whitespace(&el.text().collect::<String>())
}

/// Text nodes trimmed and joined by single spaces.
pub(crate) fn joined_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text as a browser would lay it out: line breaks at `<br>` and block
/// elements, other whitespace collapsed.
pub(crate) fn inner_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_text(el, &mut raw);
    raw.split('\n')
        .map(squash_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
        } else if let Some(element) = ElementRef::wrap(child) {
            let name = element.value().name();
            if matches!(name, "script" | "style") {
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push('\n');
            }
            push_text(element, out);
            if block {
                out.push('\n');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL: &str = r#"
        <html><body>
        <table>
          <tr><td><span>Reference Number</span></td><td>1234567</td></tr>
          <tr><td><span>Procuring Entity</span></td><td>  DEPARTMENT OF EDUCATION </td></tr>
          <tr><td><span>Contact Person:</span></td><td>Juan Dela Cruz<br>BAC Secretariat<br>Pasig City</td></tr>
          <tr><td><span>Status:</span> Active</td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn test_adjacent_cell() {
        let page = PageModel::parse(DETAIL);
        assert_eq!(
            LookupStrategy::AdjacentCell.lookup(&page, "Procuring Entity"),
            Some("DEPARTMENT OF EDUCATION".to_string())
        );
    }

    #[test]
    fn test_adjacent_cell_keeps_line_breaks() {
        let page = PageModel::parse(DETAIL);
        assert_eq!(
            LookupStrategy::AdjacentCell.lookup(&page, "Contact Person"),
            Some("Juan Dela Cruz\nBAC Secretariat\nPasig City".to_string())
        );
    }

    #[test]
    fn test_adjacent_cell_is_case_sensitive() {
        let page = PageModel::parse(DETAIL);
        assert_eq!(LookupStrategy::AdjacentCell.lookup(&page, "procuring entity"), None);
    }

    #[test]
    fn test_label_prefixed_cell() {
        let page = PageModel::parse(DETAIL);
        assert_eq!(LookupStrategy::AdjacentCell.lookup(&page, "Status"), None);
        assert_eq!(
            LookupStrategy::LabelPrefixedCell.lookup(&page, "Status"),
            Some("Active".to_string())
        );
    }

    #[test]
    fn test_row_header_with_th() {
        let page = PageModel::parse(
            "<table><tr><th>Area of Delivery</th><td>Quezon City</td></tr></table>",
        );
        assert_eq!(
            LookupStrategy::RowHeader.lookup(&page, "area of delivery"),
            Some("Quezon City".to_string())
        );
    }

    #[test]
    fn test_row_header_single_cell_row() {
        let page =
            PageModel::parse("<table><tr><td>Delivery Period</td></tr></table>");
        assert_eq!(LookupStrategy::RowHeader.lookup(&page, "Delivery Period"), None);
    }

    #[test]
    fn test_text_node_inline_value() {
        let page = PageModel::parse("<div><p>Classification: Goods</p></div>");
        assert_eq!(
            LookupStrategy::TextNode.lookup(&page, "Classification"),
            Some("Goods".to_string())
        );
    }

    #[test]
    fn test_text_node_next_sibling() {
        let page = PageModel::parse(
            "<div><label>Delivery Period</label><span>30 calendar days</span></div>",
        );
        assert_eq!(
            LookupStrategy::TextNode.lookup(&page, "delivery period"),
            Some("30 calendar days".to_string())
        );
    }

    #[test]
    fn test_text_node_next_cell_in_document_order() {
        let page = PageModel::parse(
            "<div><b>Category</b></div><div>Printing Services</div>",
        );
        // The label's own element has no sibling; the next div follows
        assert_eq!(
            LookupStrategy::TextNode.lookup(&page, "Category"),
            Some("Printing Services".to_string())
        );
    }

    #[test]
    fn test_cascade_takes_first_hit() {
        let page = PageModel::parse(DETAIL);
        assert_eq!(
            lookup_cascade(&page, "Reference Number", RENDERED_TIERS),
            Some("1234567".to_string())
        );
        assert_eq!(lookup_cascade(&page, "Solicitation Number", RENDERED_TIERS), None);
        assert_eq!(
            lookup_cascade(&page, "procuring entity", STATIC_TIERS),
            Some("DEPARTMENT OF EDUCATION".to_string())
        );
    }
}
