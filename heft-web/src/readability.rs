//! Reader-mode extraction for article-like pages.
//!
//! [`is_probably_readerable`] is a cheap structural test; [`grab_article`]
//! scores paragraphs, pushes the score up to their containers and returns
//! the text of the best container together with its qualifying siblings.
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

const MIN_CONTENT_LENGTH: usize = 140;
const MIN_READERABLE_SCORE: f64 = 20.0;
const MIN_PARAGRAPH_LENGTH: usize = 25;
const CLASS_WEIGHT: f64 = 25.0;

static UNLIKELY_CANDIDATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|footer|gdpr|header|legends|menu|related|remark|replies|rss|shoutbox|sidebar|skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|yom-remote",
    )
    .expect("static regex")
});

static MAYBE_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)and|article|body|column|content|main|shadow").expect("static regex")
});

static POSITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)article|body|content|entry|hentry|h-entry|main|page|pagination|post|text|blog|story",
    )
    .expect("static regex")
});

static NEGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)-ad-|hidden|^hid$| hid$| hid |^hid |banner|combx|comment|com-|contact|footer|gdpr|masthead|media|meta|outbrain|promo|related|scroll|share|shoutbox|sidebar|skyscraper|sponsor|shopping|tags|widget",
    )
    .expect("static regex")
});

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.( |$)").expect("static regex"));

/// Never part of readable text.
pub(crate) const NON_CONTENT: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "head", "meta", "link",
];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Text under `el`, skipping subtrees named in `skip` and separating block
/// elements with spaces so adjacent cells do not run together.
pub(crate) fn collect_text(el: ElementRef<'_>, skip: &[&str], out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if skip.contains(&name) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push(' ');
            }
            collect_text(child_el, skip, out);
            if block {
                out.push(' ');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

fn text_content(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, NON_CONTENT, &mut out);
    out
}

fn text_len(text: &str) -> usize {
    text.trim().chars().count()
}

fn is_visible(el: ElementRef<'_>) -> bool {
    let v = el.value();
    let hidden_by_style = v.attr("style").is_some_and(|style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    });
    !hidden_by_style && v.attr("hidden").is_none() && v.attr("aria-hidden") != Some("true")
}

fn class_and_id(el: ElementRef<'_>) -> String {
    let v = el.value();
    format!("{} {}", v.attr("class").unwrap_or(""), v.attr("id").unwrap_or(""))
}

fn is_unlikely(el: ElementRef<'_>) -> bool {
    let tags = class_and_id(el);
    UNLIKELY_CANDIDATES.is_match(&tags) && !MAYBE_CANDIDATE.is_match(&tags)
}

fn inside_list_item(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "li")
}

/// Whether the page looks like an article: enough visible paragraph-like
/// nodes carrying at least [`MIN_CONTENT_LENGTH`] characters each.
pub fn is_probably_readerable(doc: &Html) -> bool {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for el in doc.root_element().descendants().filter_map(ElementRef::wrap) {
        match el.value().name() {
            "p" | "pre" | "article" => {
                if seen.insert(el.id()) {
                    nodes.push(el);
                }
            }
            // `<div>text<br>text</div>` is a paragraph in disguise.
            "br" => {
                if let Some(parent) = el.parent().and_then(ElementRef::wrap) {
                    if parent.value().name() == "div" && seen.insert(parent.id()) {
                        nodes.push(parent);
                    }
                }
            }
            _ => {}
        }
    }

    let mut score = 0.0;
    for node in nodes {
        if !is_visible(node) || is_unlikely(node) {
            continue;
        }
        if node.value().name() == "p" && inside_list_item(node) {
            continue;
        }
        let len = text_len(&text_content(node));
        if len < MIN_CONTENT_LENGTH {
            continue;
        }
        score += ((len - MIN_CONTENT_LENGTH) as f64).sqrt();
        if score > MIN_READERABLE_SCORE {
            return true;
        }
    }
    false
}

fn class_weight(el: ElementRef<'_>) -> f64 {
    let mut weight = 0.0;
    for attr in ["class", "id"] {
        if let Some(value) = el.value().attr(attr).filter(|v| !v.is_empty()) {
            if NEGATIVE.is_match(value) {
                weight -= CLASS_WEIGHT;
            }
            if POSITIVE.is_match(value) {
                weight += CLASS_WEIGHT;
            }
        }
    }
    weight
}

fn initial_score(el: ElementRef<'_>) -> f64 {
    let base = match el.value().name() {
        "div" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    };
    base + class_weight(el)
}

/// Share of the element's text that sits inside links.
fn link_density(el: ElementRef<'_>) -> f64 {
    let total = text_len(&text_content(el));
    if total == 0 {
        return 0.0;
    }
    let linked: usize = el
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|d| d.value().name() == "a")
        .map(|a| text_len(&text_content(a)))
        .sum();
    linked as f64 / total as f64
}

/// Text of the highest scoring content container, or `None` when nothing
/// on the page scores as content.
pub fn grab_article(doc: &Html) -> Option<String> {
    // Candidates stay in document order so ties resolve to the earliest.
    let mut candidates: Vec<(ElementRef<'_>, f64)> = Vec::new();
    let mut slot_of = HashMap::new();

    for el in doc.root_element().descendants().filter_map(ElementRef::wrap) {
        if !matches!(el.value().name(), "p" | "pre" | "td") {
            continue;
        }
        if !is_visible(el) || is_unlikely(el) {
            continue;
        }
        let text = text_content(el);
        let len = text_len(&text);
        if len < MIN_PARAGRAPH_LENGTH {
            continue;
        }

        let content_score =
            1.0 + text.matches(',').count() as f64 + (len / 100).min(3) as f64;
        let containers = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .filter(|a| a.value().name() != "html")
            .take(2);
        for (level, container) in containers.enumerate() {
            let slot = *slot_of.entry(container.id()).or_insert_with(|| {
                candidates.push((container, initial_score(container)));
                candidates.len() - 1
            });
            candidates[slot].1 += if level == 0 {
                content_score
            } else {
                content_score / 2.0
            };
        }
    }

    let finals: HashMap<_, f64> = candidates
        .iter()
        .map(|(el, score)| (el.id(), score * (1.0 - link_density(*el))))
        .collect();
    let mut best: Option<(ElementRef<'_>, f64)> = None;
    for (el, _) in &candidates {
        let score = finals[&el.id()];
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((*el, score));
        }
    }
    let (top, top_score) = best?;

    let threshold = (top_score * 0.2).max(10.0);
    let top_class = top.value().attr("class").unwrap_or("");

    let keep = |sibling: ElementRef<'_>| -> bool {
        if sibling.id() == top.id() {
            return true;
        }
        let bonus = if !top_class.is_empty() && sibling.value().attr("class") == Some(top_class) {
            top_score * 0.2
        } else {
            0.0
        };
        if finals
            .get(&sibling.id())
            .is_some_and(|score| score + bonus >= threshold)
        {
            return true;
        }
        if sibling.value().name() != "p" {
            return false;
        }
        let text = text_content(sibling);
        let len = text_len(&text);
        let density = link_density(sibling);
        (len > 80 && density < 0.25)
            || (len > 0 && len <= 80 && density == 0.0 && SENTENCE_END.is_match(text.trim()))
    };

    let parts: Vec<String> = match top.parent().and_then(ElementRef::wrap) {
        Some(parent) => parent
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|sibling| keep(*sibling))
            .map(text_content)
            .collect(),
        None => vec![text_content(top)],
    };

    let text = parts.join(" ");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(seed: &str) -> String {
        format!(
            "{seed} The shoe weighs about 400 grams per pair in the box, which is heavier than most \
             running shoes, because the sole is made of thick rubber and the upper is full leather. \
             Reviewers agree the weight is noticeable but not uncomfortable."
        )
    }

    fn article_page() -> String {
        format!(
            r#"<html><head><title>t</title><script>var x = "ignored";</script></head>
            <body>
              <div class="menu"><a href="/">Home</a> <a href="/shop">Shop</a></div>
              <div class="post-content" id="main">
                <p>{}</p>
                <p>{}</p>
                <p>{}</p>
              </div>
              <div class="sidebar"><p>Related: other shoes you might like to buy today.</p></div>
              <footer>Copyright</footer>
            </body></html>"#,
            paragraph("First."),
            paragraph("Second."),
            paragraph("Third.")
        )
    }

    #[test]
    fn long_paragraphs_are_readerable() {
        let doc = Html::parse_document(&article_page());
        assert!(is_probably_readerable(&doc));
    }

    #[test]
    fn short_or_hidden_content_is_not_readerable() {
        let short = Html::parse_document("<html><body><p>Weight: 400 g</p></body></html>");
        assert!(!is_probably_readerable(&short));

        let hidden = format!(
            r#"<html><body><div style="display: none"><p style="display:none">{}</p></div>
               <p hidden>{}</p><p aria-hidden="true">{}</p></body></html>"#,
            paragraph("a"),
            paragraph("b"),
            paragraph("c")
        );
        assert!(!is_probably_readerable(&Html::parse_document(&hidden)));
    }

    #[test]
    fn unlikely_containers_do_not_count() {
        let page = format!(
            r#"<html><body><p class="comment">{}</p><p class="comment">{}</p>
               <p class="comment">{}</p></body></html>"#,
            paragraph("a"),
            paragraph("b"),
            paragraph("c")
        );
        assert!(!is_probably_readerable(&Html::parse_document(&page)));
    }

    #[test]
    fn div_with_line_breaks_counts_as_paragraph() {
        let body = paragraph("x").replace(", ", ",<br>");
        let page = format!(
            "<html><body><div>{body}</div><div>{body}</div><div>{body}</div></body></html>"
        );
        assert!(is_probably_readerable(&Html::parse_document(&page)));
    }

    #[test]
    fn article_text_keeps_content_and_drops_chrome() {
        let doc = Html::parse_document(&article_page());
        let text = grab_article(&doc).expect("article");
        assert!(text.contains("First."));
        assert!(text.contains("Third."));
        assert!(!text.contains("Shop"));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn link_heavy_blocks_lose_to_prose() {
        let links = (0..20)
            .map(|i| format!(r#"<a href="/p/{i}">Product number {i} with a long name</a>, "#))
            .collect::<String>();
        let page = format!(
            r#"<html><body>
                <div id="links"><p>{links}</p></div>
                <div id="story"><p>{}</p><p>{}</p></div>
            </body></html>"#,
            paragraph("Prose one."),
            paragraph("Prose two.")
        );
        let text = grab_article(&Html::parse_document(&page)).expect("article");
        assert!(text.contains("Prose one."));
        assert!(!text.contains("Product number 3"));
    }

    #[test]
    fn table_cells_are_separated() {
        let doc = Html::parse_document(
            "<html><body><table><tr><td>Weight</td><td>400g</td></tr></table></body></html>",
        );
        let mut out = String::new();
        collect_text(doc.root_element(), NON_CONTENT, &mut out);
        let words: Vec<&str> = out.split_whitespace().collect();
        assert_eq!(words, ["Weight", "400g"]);
    }

    #[test]
    fn tied_candidates_resolve_to_the_first_in_document_order() {
        let alpha = "alpha ".repeat(66);
        let bravo = "bravo ".repeat(66);
        let page = format!(
            r#"<html><body><div id="x1"><p>{alpha}</p></div>
               <section><div id="x2"><p>{bravo}</p></div></section></body></html>"#
        );
        let doc = Html::parse_document(&page);
        let first = grab_article(&doc).expect("article");
        assert!(first.contains("alpha"));
        assert!(!first.contains("bravo"));
        for _ in 0..64 {
            assert_eq!(grab_article(&doc).as_deref(), Some(first.as_str()));
        }
    }

    #[test]
    fn nothing_scoreable_yields_none() {
        let doc = Html::parse_document("<html><body><span>hi</span></body></html>");
        assert!(grab_article(&doc).is_none());
    }
}
