//! HTML extraction for listing and detail pages.
//!
//! Listing pages enumerate a day's items inside one of a few known containers. A page without
//! any known container is structural drift and fails with [`ExtractionError::NoContainer`];
//! known containers that are all empty mean a legitimately empty day.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::models::{NewNewsItem, Ordinal};

use super::RawPage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("no listing container found on page")]
    NoContainer,
    #[error("malformed ordinal {0:?}")]
    MalformedOrdinal(String),
    #[error("items disagree on the day's total: expected {expected}, found {found}")]
    InconsistentTotal { expected: u32, found: u32 },
    #[error("detail page has no body text")]
    EmptyBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    pub link: String,
    pub ordinal: Ordinal,
}

impl ListingEntry {
    pub fn into_item(self, date: NaiveDate, content: Option<String>) -> NewNewsItem {
        NewNewsItem {
            date,
            title: self.title,
            link: self.link,
            ordinal: self.ordinal,
            content,
        }
    }
}

/// An entry dropped from the listing; its siblings are unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub link: String,
    pub error: ExtractionError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub entries: Vec<ListingEntry>,
    pub rejected: Vec<RejectedEntry>,
}

impl Listing {
    /// The day's total as agreed by every entry.
    pub fn total(&self) -> Option<u32> {
        self.entries.first().map(|e| e.ordinal.total)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.rejected.is_empty()
    }
}

fn selectors(css: &[&str]) -> Vec<Selector> {
    css.iter()
        .map(|s| Selector::parse(s).expect("static selector"))
        .collect()
}

static LISTING_CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        "ul.rililist",
        "ul#content",
        "ul.news-items",
        "div.news-list",
        "div#news-list",
        "div.list-content",
        "div.content-list",
        "div.video-list",
        "div#video-list",
    ])
});

static BODY_CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        ".cnt_bd",
        "#content_body",
        "#content_area",
        ".content_area",
        ".article-body",
        ".allcontent",
        "article",
        "#content",
    ])
});

static LIST_ITEM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").expect("static selector"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));
static ORDINAL_MARK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".ordinal").expect("static selector"));
static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("static selector"));

static TITLE_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[视频\]|完整版|\d{2}:\d{2}:\d{2}|\d{4}-\d{2}-\d{2}|\d{8}").expect("static regex")
});
static BODY_LEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^央视网消息\s*[（(]\s*新闻联播\s*[）)]\s*[：:]\s*").expect("static regex")
});
static CREDIT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:责任)?编辑\s*[：:]|[文图]\s*/|(?:摄影|记者|作者)\s*[：:]|[\p{Han}]{2,4}$)",
    )
    .expect("static regex")
});

const LOAD_MORE: &str = "加载更多";

struct RawEntry {
    title: String,
    link: String,
    marker: Option<String>,
}

/// Parses a listing page into entries with ordinals. Entries without an explicit `k/N` marker get
/// one synthesized from their position on the page.
///
/// Containers are tried in priority order and the first one holding any entry wins, so an empty
/// decoy container does not hide a populated one further down.
pub fn extract_listing(page: &RawPage) -> Result<Listing, ExtractionError> {
    let document = Html::parse_document(&page.body);
    let containers: Vec<ElementRef> = LISTING_CONTAINERS
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .collect();
    if containers.is_empty() {
        return Err(ExtractionError::NoContainer);
    }

    let base = Url::parse(&page.url).ok();
    let raw = containers
        .into_iter()
        .map(|container| container_entries(container, base.as_ref()))
        .find(|entries| !entries.is_empty())
        .unwrap_or_default();

    let count = raw.len() as u32;
    let mut listing = Listing::default();
    for (index, entry) in raw.into_iter().enumerate() {
        let ordinal = match entry.marker {
            Some(marker) => match marker.parse::<Ordinal>() {
                Ok(ordinal) => ordinal,
                Err(error) => {
                    tracing::warn!(link = %entry.link, %error, "skipping listing entry");
                    listing.rejected.push(RejectedEntry {
                        link: entry.link,
                        error,
                    });
                    continue;
                }
            },
            None => Ordinal {
                position: index as u32 + 1,
                total: count,
            },
        };
        listing.entries.push(ListingEntry {
            title: entry.title,
            link: entry.link,
            ordinal,
        });
    }

    check_totals(&listing)?;
    Ok(listing)
}

/// Entries of one container, deduplicated by link in page order.
fn container_entries(container: ElementRef, base: Option<&Url>) -> Vec<RawEntry> {
    let mut items: Vec<ElementRef> = container.select(&LIST_ITEM).collect();
    if items.is_empty() {
        items = container.select(&ANCHOR).collect();
    }

    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(|item| read_entry(item, base))
        .filter(|entry| seen.insert(entry.link.clone()))
        .collect()
}

fn check_totals(listing: &Listing) -> Result<(), ExtractionError> {
    let Some(expected) = listing.total() else {
        return Ok(());
    };
    if let Some(other) = listing.entries.iter().find(|e| e.ordinal.total != expected) {
        return Err(ExtractionError::InconsistentTotal {
            expected,
            found: other.ordinal.total,
        });
    }
    let seen = (listing.entries.len() + listing.rejected.len()) as u32;
    if seen > expected {
        return Err(ExtractionError::InconsistentTotal {
            expected,
            found: seen,
        });
    }
    Ok(())
}

fn read_entry(item: ElementRef, base: Option<&Url>) -> Option<RawEntry> {
    let anchors: Vec<ElementRef> = if item.value().name() == "a" {
        vec![item]
    } else {
        item.select(&ANCHOR).collect()
    };
    let first = anchors.first()?;

    let href = first.value().attr("href")?.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let raw_title = anchors
        .iter()
        .map(|a| inline_text(*a))
        .find(|t| !t.is_empty())
        .or_else(|| first.value().attr("title").map(|t| t.trim().to_string()))?;
    if is_full_broadcast(&raw_title) {
        return None;
    }
    let title = clean_title(&raw_title);
    if title.is_empty() {
        return None;
    }

    let link = resolve_link(base, href)?;
    let marker = item
        .value()
        .attr("data-ordinal")
        .map(|m| m.trim().to_string())
        .or_else(|| item.select(&ORDINAL_MARK).next().map(inline_text))
        .filter(|m| !m.is_empty());

    Some(RawEntry {
        title,
        link,
        marker,
    })
}

fn resolve_link(base: Option<&Url>, href: &str) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };
    match resolved {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            tracing::debug!(href, error = %e, "unresolvable listing link");
            None
        }
    }
}

fn is_full_broadcast(title: &str) -> bool {
    let title = title.trim();
    title.starts_with("完整版《新闻联播》") || title.starts_with("完整版<新闻联播>")
}

fn clean_title(raw: &str) -> String {
    TITLE_NOISE
        .replace_all(raw, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts the body text of a detail page.
pub fn extract_detail(page: &RawPage) -> Result<String, ExtractionError> {
    let document = Html::parse_document(&page.body);

    for selector in BODY_CONTAINERS.iter() {
        if let Some(body) = document.select(selector).next().and_then(block_text) {
            return Ok(body);
        }
    }

    let paragraphs: Vec<String> = document.select(&PARAGRAPH).map(inline_text).collect();
    clean_body(paragraphs).ok_or(ExtractionError::EmptyBody)
}

/// Cleaned text of a body container, preferring its paragraphs.
fn block_text(container: ElementRef) -> Option<String> {
    let paragraphs: Vec<String> = container
        .select(&PARAGRAPH)
        .map(inline_text)
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.is_empty() {
        clean_body(visible_text(container).map(str::to_string).collect())
    } else {
        clean_body(paragraphs)
    }
}

/// Drops blank and placeholder lines, the dateline lead and trailing editor credits.
fn clean_body(lines: Vec<String>) -> Option<String> {
    let joined = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && *l != LOAD_MORE)
        .collect::<Vec<_>>()
        .join("\n");
    let text = BODY_LEAD.replace(&joined, "");

    let all: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let mut kept = all.clone();
    while kept.last().is_some_and(|l| CREDIT_LINE.is_match(l)) {
        kept.pop();
    }
    // Nothing but credits: keep them rather than report an empty body.
    if kept.is_empty() {
        kept = all;
    }

    (!kept.is_empty()).then(|| kept.join("\n"))
}

fn is_hidden(element: &ElementRef) -> bool {
    matches!(element.value().name(), "script" | "style" | "noscript")
}

/// Text nodes of `element` outside script/style.
fn visible_text<'a>(element: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    element.descendants().filter_map(|node| {
        let text = node.value().as_text()?;
        let parent = node.parent().and_then(ElementRef::wrap)?;
        (!is_hidden(&parent)).then_some(&**text)
    })
}

/// All visible text of `element` run together, whitespace collapsed.
fn inline_text(element: ElementRef) -> String {
    visible_text(element)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, body: &str) -> RawPage {
        RawPage {
            url: url.to_string(),
            status: 200,
            body: body.to_string(),
        }
    }

    const LISTING_URL: &str = "https://tv.cctv.com/lm/xwlb/day/20220101.shtml";

    #[test]
    fn reads_explicit_ordinals() {
        let html = r#"
            <html><body><ul class="rililist">
              <li data-ordinal="1/3"><a href="/2022/01/01/VIDE1.shtml">[视频]国内要闻一</a></li>
              <li data-ordinal="2/3"><a href="/2022/01/01/VIDE2.shtml">[视频]国内要闻二</a></li>
              <li data-ordinal="3/3"><a href="https://tv.cctv.com/2022/01/01/VIDE3.shtml">国际要闻</a></li>
            </ul></body></html>"#;

        let listing = extract_listing(&page(LISTING_URL, html)).unwrap();
        assert!(listing.rejected.is_empty());
        assert_eq!(listing.total(), Some(3));
        assert_eq!(
            listing.entries[0],
            ListingEntry {
                title: "国内要闻一".to_string(),
                link: "https://tv.cctv.com/2022/01/01/VIDE1.shtml".to_string(),
                ordinal: Ordinal::new(1, 3).unwrap(),
            }
        );
        assert_eq!(listing.entries[2].link, "https://tv.cctv.com/2022/01/01/VIDE3.shtml");
    }

    #[test]
    fn synthesizes_ordinals_and_drops_noise() {
        let html = r##"
            <div class="wrapper">
              <ul id="content">
                <li>
                  <div class="image"><a href="/v/full.shtml"><img src="x.jpg"></a></div>
                  <a href="/v/full.shtml">完整版《新闻联播》 20220101 19:00</a>
                </li>
                <li>
                  <div class="image"><a href="/v/a.shtml" title="ignored"><img src="a.jpg"></a></div>
                  <div class="title"><a href="/v/a.shtml">
                      [视频]第一条  新闻
                      00:02:18
                  </a></div>
                </li>
                <li><a href="/v/b.shtml">第二条新闻 2022-01-01</a></li>
                <li><a href="/v/b.shtml">第二条新闻（重复）</a></li>
                <li><a href="#">返回顶部</a></li>
              </ul>
            </div>"##;

        let listing = extract_listing(&page(LISTING_URL, html)).unwrap();
        let got: Vec<(&str, &str, String)> = listing
            .entries
            .iter()
            .map(|e| (e.title.as_str(), e.link.as_str(), e.ordinal.to_string()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("第一条 新闻", "https://tv.cctv.com/v/a.shtml", "1/2".to_string()),
                ("第二条新闻", "https://tv.cctv.com/v/b.shtml", "2/2".to_string()),
            ]
        );
    }

    #[test]
    fn missing_container_is_structural_failure() {
        let html = "<html><body><div class=\"redesigned\"><a href=\"/x\">x</a></div></body></html>";
        assert_eq!(
            extract_listing(&page(LISTING_URL, html)),
            Err(ExtractionError::NoContainer)
        );
    }

    #[test]
    fn empty_container_means_no_news() {
        let html = r#"<ul class="rililist">  </ul>"#;
        let listing = extract_listing(&page(LISTING_URL, html)).unwrap();
        assert!(listing.is_empty());
        assert_eq!(listing.total(), None);
    }

    #[test]
    fn empty_container_falls_through_to_populated_one() {
        let html = r#"<html><body>
            <ul id="content"></ul>
            <div class="news-list">
              <a href="/v/a.shtml">甲新闻</a>
              <a href="/v/b.shtml">乙新闻</a>
            </div></body></html>"#;

        let listing = extract_listing(&page(LISTING_URL, html)).unwrap();
        let links: Vec<&str> = listing.entries.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://tv.cctv.com/v/a.shtml", "https://tv.cctv.com/v/b.shtml"]
        );
        assert_eq!(listing.total(), Some(2));
    }

    #[test]
    fn all_known_containers_empty_means_no_news() {
        let html = r#"<ul class="rililist"></ul><div id="video-list"><p>暂无内容</p></div>"#;
        let listing = extract_listing(&page(LISTING_URL, html)).unwrap();
        assert!(listing.is_empty());
    }

    #[test]
    fn reads_video_list_container() {
        let html = r#"<div class="video-list">
              <a href="/v/a.shtml">[视频]视频新闻</a>
            </div>"#;

        let listing = extract_listing(&page(LISTING_URL, html)).unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].title, "视频新闻");
        assert_eq!(listing.entries[0].ordinal.to_string(), "1/1");
    }

    #[test]
    fn malformed_ordinal_rejects_only_that_entry() {
        let html = r#"<ul class="rililist">
              <li><span class="ordinal">1/3</span><a href="/a.shtml">甲</a></li>
              <li><span class="ordinal">two of three</span><a href="/b.shtml">乙</a></li>
              <li><span class="ordinal">3/3</span><a href="/c.shtml">丙</a></li>
            </ul>"#;

        let listing = extract_listing(&page(LISTING_URL, html)).unwrap();
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(
            listing.rejected,
            vec![RejectedEntry {
                link: "https://tv.cctv.com/b.shtml".to_string(),
                error: ExtractionError::MalformedOrdinal("two of three".to_string()),
            }]
        );
    }

    #[test]
    fn disagreeing_totals_fail_the_listing() {
        let html = r#"<ul class="rililist">
              <li data-ordinal="1/2"><a href="/a.shtml">甲</a></li>
              <li data-ordinal="2/3"><a href="/b.shtml">乙</a></li>
            </ul>"#;
        assert_eq!(
            extract_listing(&page(LISTING_URL, html)),
            Err(ExtractionError::InconsistentTotal {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn more_entries_than_total_fail_the_listing() {
        let html = r#"<ul class="rililist">
              <li data-ordinal="1/1"><a href="/a.shtml">甲</a></li>
              <li data-ordinal="1/1"><a href="/b.shtml">乙</a></li>
            </ul>"#;
        assert!(matches!(
            extract_listing(&page(LISTING_URL, html)),
            Err(ExtractionError::InconsistentTotal { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn detail_body_is_cleaned() {
        let html = r##"<html><body>
            <div class="nav"><p>导航</p></div>
            <div class="cnt_bd">
              <script>if ($.trim($("#content_area").html())==""){ }</script>
              <p>央视网消息（新闻联播）：今天，全国各地<strong>迎来</strong>新年。</p>
              <p>  各地举办了丰富多彩的活动。 </p>
              <p>编辑：张三</p>
              <p>王小明</p>
            </div></body></html>"##;

        let body = extract_detail(&page("https://tv.cctv.com/v/a.shtml", html)).unwrap();
        assert_eq!(body, "今天，全国各地迎来新年。\n各地举办了丰富多彩的活动。");
    }

    #[test]
    fn placeholder_container_falls_through() {
        let html = r#"<div class="cnt_bd"><p>加载更多</p></div>
            <div id="content_area">第一段。<br>第二段。<script>var x = 1;</script></div>"#;

        let body = extract_detail(&page("https://tv.cctv.com/v/a.shtml", html)).unwrap();
        assert_eq!(body, "第一段。\n第二段。");
    }

    #[test]
    fn paragraphs_anywhere_are_the_last_resort() {
        let html = "<body><section><p>孤立的段落内容。</p></section></body>";
        let body = extract_detail(&page("https://tv.cctv.com/v/a.shtml", html)).unwrap();
        assert_eq!(body, "孤立的段落内容。");
    }

    #[test]
    fn bodiless_detail_page_is_an_error() {
        let html = "<html><body><div class=\"cnt_bd\">  </div></body></html>";
        assert_eq!(
            extract_detail(&page("https://tv.cctv.com/v/a.shtml", html)),
            Err(ExtractionError::EmptyBody)
        );
    }
}
