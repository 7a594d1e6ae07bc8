use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::{ArticleKey, InvalidArticleKey, Record, RecordKey};

/// What the caller already has. Accepts a list of record identifiers, or the
/// per-article list names (`{"articolul_10": ["932P"]}`), optionally split by
/// year (`{"articolul_10": {"2024": ["932P"]}}`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum KnownRecords {
    Records(Vec<KnownRecord>),
    ByArticle(HashMap<String, KnownLists>),
}

impl Default for KnownRecords {
    fn default() -> Self {
        KnownRecords::Records(vec![])
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum KnownLists {
    Names(Vec<String>),
    ByYear(HashMap<String, Vec<String>>),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct KnownRecord {
    pub list_name: String,
    pub number_order: String,
    pub year: i32,
}

#[derive(Debug, Error)]
pub enum KnownRecordsError {
    #[error(transparent)]
    InvalidArticle(#[from] InvalidArticleKey),
    #[error("year must be numeric, now - {0}")]
    InvalidYear(String),
}

/// Lookup structure built once per run from [`KnownRecords`].
#[derive(Debug, Default)]
pub struct KnownSet {
    records: HashSet<RecordKey>,
    lists: HashSet<(ArticleKey, String)>,
    lists_by_year: HashSet<(ArticleKey, i32, String)>,
    articles: Vec<ArticleKey>,
}

impl TryFrom<&KnownRecords> for KnownSet {
    type Error = KnownRecordsError;

    fn try_from(value: &KnownRecords) -> Result<Self, Self::Error> {
        let mut known = KnownSet::default();
        match value {
            KnownRecords::Records(records) => {
                known.records = records
                    .iter()
                    .map(|record| RecordKey {
                        list_name: record.list_name.clone(),
                        number_order: record.number_order.clone(),
                        year: record.year,
                    })
                    .collect();
            }
            KnownRecords::ByArticle(by_article) => {
                for (article, lists) in by_article {
                    let article = article.parse::<ArticleKey>()?;
                    known.articles.push(article);
                    match lists {
                        KnownLists::Names(names) => known
                            .lists
                            .extend(names.iter().map(|name| (article, name.clone()))),
                        KnownLists::ByYear(by_year) => {
                            for (year, names) in by_year {
                                let year = year
                                    .trim()
                                    .parse::<i32>()
                                    .map_err(|_| KnownRecordsError::InvalidYear(year.clone()))?;
                                known.lists_by_year.extend(
                                    names.iter().map(|name| (article, year, name.clone())),
                                );
                            }
                        }
                    }
                }
                known.articles.sort();
            }
        }
        Ok(known)
    }
}

impl KnownSet {
    /// Articles the caller named in its known records, if it named any.
    pub fn articles(&self) -> Option<&[ArticleKey]> {
        if self.articles.is_empty() {
            None
        } else {
            Some(&self.articles)
        }
    }

    /// A listing the caller already has in full; its document is not downloaded.
    pub fn is_known_listing(&self, article: ArticleKey, list_name: &str, year: Option<i32>) -> bool {
        self.lists.contains(&(article, list_name.to_string()))
            || year.map_or(false, |year| {
                self.lists_by_year
                    .contains(&(article, year, list_name.to_string()))
            })
    }

    pub fn is_known(&self, article: ArticleKey, record: &Record) -> bool {
        self.records.contains(&record.key())
            || self.is_known_listing(article, &record.list_name, Some(record.year))
    }

    /// Keeps the records the caller does not have yet, in the order they were parsed.
    /// Returns them with the number of records dropped.
    pub fn retain_unknown(
        &self,
        records: Vec<(ArticleKey, Record)>,
    ) -> (Vec<(ArticleKey, Record)>, usize) {
        let total = records.len();
        let unknown: Vec<_> = records
            .into_iter()
            .filter(|(article, record)| !self.is_known(*article, record))
            .collect();
        let dropped = total - unknown.len();
        (unknown, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::{KnownRecords, KnownRecordsError, KnownSet};
    use crate::records::{ArticleKey, Record};
    use serde_json::json;

    fn record(list_name: &str, number_order: &str, year: i32) -> Record {
        Record {
            list_name: list_name.to_string(),
            number_order: number_order.to_string(),
            year,
            date: format!("16.05.{year}"),
        }
    }

    #[test]
    fn test_record_identifiers_ignore_the_date() {
        let known: KnownRecords = serde_json::from_value(json!([
            { "list_name": "932P", "number_order": "(16309/2020)", "year": 2024 }
        ]))
        .unwrap();
        let known = KnownSet::try_from(&known).unwrap();

        let mut restamped = record("932P", "(16309/2020)", 2024);
        restamped.date = "17.05.2024".to_string();

        assert!(known.is_known(ArticleKey::new(10), &restamped));
        assert!(!known.is_known(ArticleKey::new(10), &record("932P", "(16310/2020)", 2024)));
        assert!(known.articles().is_none());
    }

    #[test]
    fn test_list_names_mark_whole_listings_as_known() {
        let known: KnownRecords = serde_json::from_value(json!({
            "articolul_10": ["932P", "931P"],
            "articolul_11": { "2024": ["925P"] }
        }))
        .unwrap();
        let known = KnownSet::try_from(&known).unwrap();

        assert!(known.is_known_listing(ArticleKey::new(10), "932P", None));
        assert!(!known.is_known_listing(ArticleKey::new(11), "932P", None));
        assert!(known.is_known_listing(ArticleKey::new(11), "925P", Some(2024)));
        assert!(!known.is_known_listing(ArticleKey::new(11), "925P", Some(2023)));
        assert_eq!(
            known.articles(),
            Some(&[ArticleKey::new(10), ArticleKey::new(11)][..])
        );
    }

    #[test]
    fn test_retain_unknown_keeps_order_and_counts_dropped() {
        let known: KnownRecords = serde_json::from_value(json!([
            { "list_name": "932P", "number_order": "(2/2020)", "year": 2024 }
        ]))
        .unwrap();
        let known = KnownSet::try_from(&known).unwrap();
        let article = ArticleKey::new(10);
        let records = vec![
            (article, record("932P", "(1/2020)", 2024)),
            (article, record("932P", "(2/2020)", 2024)),
            (article, record("932P", "(3/2020)", 2024)),
        ];

        let (unknown, dropped) = known.retain_unknown(records);

        assert_eq!(dropped, 1);
        let orders: Vec<_> = unknown
            .iter()
            .map(|(_, record)| record.number_order.as_str())
            .collect();
        assert_eq!(orders, vec!["(1/2020)", "(3/2020)"]);
    }

    #[test]
    fn test_invalid_article_key_is_rejected() {
        let known: KnownRecords =
            serde_json::from_value(json!({ "articul_10": ["932P"] })).unwrap();
        let result = KnownSet::try_from(&known);
        assert!(matches!(result, Err(KnownRecordsError::InvalidArticle(_))));
    }

    #[test]
    fn test_non_numeric_year_is_rejected() {
        let known: KnownRecords =
            serde_json::from_value(json!({ "articolul_10": { "last": ["932P"] } })).unwrap();
        let result = KnownSet::try_from(&known);
        assert!(matches!(result, Err(KnownRecordsError::InvalidYear(year)) if year == "last"));
    }

    #[test]
    fn test_empty_known_records_know_nothing() {
        let known = KnownSet::try_from(&KnownRecords::default()).unwrap();
        assert!(!known.is_known(ArticleKey::new(10), &record("932P", "(1/2020)", 2024)));
    }
}
