use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

lazy_static! {
    pub(crate) static ref ORDER_NUMBER: Regex =
        Regex::new(r"\(\d+/\d+\)").expect("ORDER_NUMBER regex to compile");
    static ref WHOLE_ORDER_NUMBER: Regex =
        Regex::new(r"^\(\d+/\d+\)$").expect("WHOLE_ORDER_NUMBER regex to compile");
}

const ARTICLE_PREFIX: &str = "articolul_";

/// The legal article a citizenship order was granted under,
/// written as `articolul_10` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArticleKey(u32);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("articolul must be named like `articolul_10`, now - {0}")]
pub struct InvalidArticleKey(pub String);

impl ArticleKey {
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

impl Display for ArticleKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{ARTICLE_PREFIX}{}", self.0)
    }
}

impl FromStr for ArticleKey {
    type Err = InvalidArticleKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .strip_prefix(ARTICLE_PREFIX)
            .filter(|number| !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()))
            .and_then(|number| number.parse::<u32>().ok())
            .map(ArticleKey)
            .ok_or_else(|| InvalidArticleKey(value.to_string()))
    }
}

impl Serialize for ArticleKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ArticleKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub list_name: String,
    /// Kept exactly as printed, eg: `(16309/2020)`.
    pub number_order: String,
    pub year: i32,
    /// Kept exactly as printed on the listing, eg: `16.05.2024`.
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub list_name: String,
    pub number_order: String,
    pub year: i32,
}

impl Record {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            list_name: self.list_name.clone(),
            number_order: self.number_order.clone(),
            year: self.year,
        }
    }

    pub(crate) fn has_well_formed_number_order(&self) -> bool {
        WHOLE_ORDER_NUMBER.is_match(&self.number_order)
    }
}

/// Records grouped by article. Serializes as
/// `{"articolul_10": [record, ...], "articolul_11": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet(BTreeMap<ArticleKey, Vec<Record>>);

impl ResultSet {
    pub fn with_articles(articles: impl IntoIterator<Item = ArticleKey>) -> Self {
        Self(
            articles
                .into_iter()
                .map(|article| (article, Vec::new()))
                .collect(),
        )
    }

    pub fn push(&mut self, article: ArticleKey, record: Record) {
        self.0.entry(article).or_default().push(record);
    }

    pub fn get(&self, article: &ArticleKey) -> Option<&Vec<Record>> {
        self.0.get(article)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArticleKey, &Vec<Record>)> {
        self.0.iter()
    }

    pub fn articles(&self) -> impl Iterator<Item = &ArticleKey> {
        self.0.keys()
    }

    pub fn number_of_buckets(&self) -> usize {
        self.0.len()
    }

    pub fn number_of_records(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Concatenates every bucket, in key order.
    pub fn flatten(&self) -> Vec<(ArticleKey, Record)> {
        self.0
            .iter()
            .flat_map(|(article, records)| {
                records.iter().cloned().map(move |record| (*article, record))
            })
            .collect()
    }
}
