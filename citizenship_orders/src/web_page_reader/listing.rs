use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::records::ArticleKey;
use crate::web_page_reader::ListingEntry;

lazy_static! {
    static ref LISTING_DATE: Regex =
        Regex::new(r"\d+\.\d+\.\d+").expect("LISTING_DATE regex to compile");
    static ref ORDER_ITEMS: Selector = Selector::parse("div.penci-entry-content ul li")
        .expect("ORDER_ITEMS selector to compile");
    static ref ORDER_LINK: Selector = Selector::parse("a[href]").expect("ORDER_LINK selector to compile");
}

/// Reads the `<li>` items of an article's listing page,
/// eg: `<li><a href="/uploads/932P.pdf">932P</a> din 16.05.2024</li>`.
/// Items without a link or a date are skipped.
pub fn parse_listing(html: &str, article: ArticleKey, page_url: &Url) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);

    document
        .select(&ORDER_ITEMS)
        .filter_map(|item| listing_entry(item, article, page_url))
        .enumerate()
        .map(|(position, entry)| ListingEntry { position, ..entry })
        .collect()
}

fn listing_entry(item: ElementRef, article: ArticleKey, page_url: &Url) -> Option<ListingEntry> {
    let anchor = item.select(&ORDER_LINK).next()?;
    let list_name = anchor.text().collect::<String>().trim().to_string();
    if list_name.is_empty() {
        return None;
    }

    let item_text = item.text().collect::<Vec<_>>().join(" ");
    let date = LISTING_DATE.find(&item_text)?.as_str().to_string();

    let href = anchor.value().attr("href")?;
    let link = match page_url.join(href.trim()) {
        Ok(link) => link,
        Err(err) => {
            debug!(href, %err, "skipping listing item with an invalid link");
            return None;
        }
    };

    Some(ListingEntry {
        article,
        list_name,
        published: NaiveDate::parse_from_str(&date, "%d.%m.%Y").ok(),
        date,
        link,
        position: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::parse_listing;
    use crate::records::ArticleKey;
    use chrono::NaiveDate;
    use url::Url;

    const LISTING: &str = r#"
<html><body>
<div class="penci-entry-content entry-content">
  <p>Ordinele de acordare a cetățeniei române</p>
  <h3>2024</h3>
  <ul>
    <li><a href="https://cetatenie.just.ro/wp-content/uploads/2024/05/932P.pdf">932P</a> din 16.05.2024</li>
    <li><a href="/wp-content/uploads/2024/05/931P.pdf"> 931P </a> din 09.05.2024</li>
    <li>Ordin în curs de publicare</li>
    <li><a href="/wp-content/uploads/2024/04/930P.pdf">930P</a> fără dată</li>
  </ul>
  <h3>2023</h3>
  <ul>
    <li><a href="/wp-content/uploads/2023/12/815P.pdf">815P</a> din 21.12.2023</li>
  </ul>
</div>
<ul class="menu"><li><a href="/contact">Contact 01.01.2020</a></li></ul>
</body></html>
"#;

    #[test]
    fn test_listing_items_with_link_and_date_are_read() {
        let page = Url::parse("https://cetatenie.just.ro/ordine-articolul-10/").unwrap();
        let entries = parse_listing(LISTING, ArticleKey::new(10), &page);

        let names: Vec<_> = entries.iter().map(|entry| entry.list_name.as_str()).collect();
        assert_eq!(names, vec!["932P", "931P", "815P"]);

        let positions: Vec<_> = entries.iter().map(|entry| entry.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        let second = &entries[1];
        assert_eq!(second.date, "09.05.2024");
        assert_eq!(second.published, NaiveDate::from_ymd_opt(2024, 5, 9));
        assert_eq!(
            second.link.as_str(),
            "https://cetatenie.just.ro/wp-content/uploads/2024/05/931P.pdf"
        );
        assert!(entries.iter().all(|entry| entry.article == ArticleKey::new(10)));
    }

    #[test]
    fn test_page_without_listing_block_is_empty() {
        let page = Url::parse("https://cetatenie.just.ro/").unwrap();
        let entries = parse_listing("<html><body><ul><li><a href='/x.pdf'>1P</a> 01.01.2024</li></ul></body></html>", ArticleKey::new(10), &page);
        assert!(entries.is_empty());
    }
}
