use std::collections::HashSet;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;

use crate::records::{ArticleKey, ResultSet};

pub const SUCCESS_MESSAGE: &str = "the process finished successfully";
pub const WRONG_RESULT_MESSAGE: &str = "Wrong result";

/// What the callback receives at the end of a run:
/// `{"ok": bool, "message": string, "data": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Success(ResultSet),
    Failure { message: String, detail: Value },
    /// The run finished but its result failed validation; `data` carries the raw result.
    WrongResult(Value),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("{0} was not requested")]
    UnexpectedArticle(ArticleKey),
    #[error("{0} is missing from the result")]
    MissingArticle(ArticleKey),
    #[error("{article} has a record without a list name")]
    EmptyListName { article: ArticleKey },
    #[error("{article} has a malformed order number {number_order:?}")]
    MalformedOrderNumber {
        article: ArticleKey,
        number_order: String,
    },
    #[error("{article} has a record with year {year}")]
    InvalidYear { article: ArticleKey, year: i32 },
    #[error("{number_order} of {list_name} appears in more than one article")]
    DuplicatedAcrossArticles {
        list_name: String,
        number_order: String,
    },
}

impl Envelope {
    /// Validates the shape of `result` against the articles that were
    /// requested and wraps it.
    pub fn assemble(requested: &[ArticleKey], result: ResultSet) -> Self {
        match validate(requested, &result) {
            Ok(()) => Envelope::Success(result),
            Err(error) => {
                tracing::error!(%error, "scrape result has the wrong shape");
                let raw = serde_json::to_value(&result).unwrap_or_else(|err| json!(err.to_string()));
                Envelope::WrongResult(raw)
            }
        }
    }

    pub fn from_error(error: &anyhow::Error) -> Self {
        let causes: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
        Envelope::Failure {
            message: error.to_string(),
            detail: json!({
                "error": format!("{error:?}"),
                "causes": causes,
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Envelope::Success(_) => SUCCESS_MESSAGE,
            Envelope::Failure { message, .. } => message,
            Envelope::WrongResult(_) => WRONG_RESULT_MESSAGE,
        }
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut envelope = serializer.serialize_struct("Envelope", 3)?;
        envelope.serialize_field("ok", &self.is_ok())?;
        envelope.serialize_field("message", self.message())?;
        match self {
            Envelope::Success(result) => envelope.serialize_field("data", result)?,
            Envelope::Failure { detail, .. } => envelope.serialize_field("data", detail)?,
            Envelope::WrongResult(raw) => envelope.serialize_field("data", raw)?,
        }
        envelope.end()
    }
}

fn validate(requested: &[ArticleKey], result: &ResultSet) -> Result<(), ShapeError> {
    let requested_articles: HashSet<_> = requested.iter().collect();

    if let Some(article) = result
        .articles()
        .find(|article| !requested_articles.contains(article))
    {
        return Err(ShapeError::UnexpectedArticle(*article));
    }
    if let Some(article) = requested
        .iter()
        .find(|article| result.get(article).is_none())
    {
        return Err(ShapeError::MissingArticle(*article));
    }

    let mut seen = std::collections::HashMap::new();
    for (article, records) in result.iter() {
        for record in records {
            if record.list_name.trim().is_empty() {
                return Err(ShapeError::EmptyListName { article: *article });
            }
            if !record.has_well_formed_number_order() {
                return Err(ShapeError::MalformedOrderNumber {
                    article: *article,
                    number_order: record.number_order.clone(),
                });
            }
            if record.year <= 0 {
                return Err(ShapeError::InvalidYear {
                    article: *article,
                    year: record.year,
                });
            }
            let first_article = seen.entry(record.key()).or_insert(*article);
            if first_article != article {
                return Err(ShapeError::DuplicatedAcrossArticles {
                    list_name: record.list_name.clone(),
                    number_order: record.number_order.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate, Envelope, ShapeError};
    use crate::records::{ArticleKey, Record, ResultSet};
    use anyhow::anyhow;
    use serde_json::json;

    fn record(number_order: &str) -> Record {
        Record {
            list_name: "932P".to_string(),
            number_order: number_order.to_string(),
            year: 2024,
            date: "16.05.2024".to_string(),
        }
    }

    #[test]
    fn test_success_envelope_wire_shape() {
        let article = ArticleKey::new(10);
        let mut result = ResultSet::with_articles([article]);
        result.push(article, record("(16309/2020)"));

        let envelope = Envelope::assemble(&[article], result);

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "ok": true,
                "message": "the process finished successfully",
                "data": {
                    "articolul_10": [{
                        "list_name": "932P",
                        "number_order": "(16309/2020)",
                        "year": 2024,
                        "date": "16.05.2024"
                    }]
                }
            })
        );
    }

    #[test]
    fn test_failure_envelope_carries_the_error_chain() {
        let error = anyhow!("connection refused").context("Failed to fetch articolul_10 listing");

        let value = serde_json::to_value(Envelope::from_error(&error)).unwrap();

        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["message"], json!("Failed to fetch articolul_10 listing"));
        assert_eq!(value["data"]["causes"], json!(["connection refused"]));
    }

    #[test]
    fn test_invalid_shape_is_a_wrong_result() {
        let article = ArticleKey::new(10);
        let mut result = ResultSet::with_articles([article]);
        result.push(article, record("16309/2020"));

        let envelope = Envelope::assemble(&[article], result.clone());
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["message"], json!("Wrong result"));
        assert_eq!(value["data"], serde_json::to_value(&result).unwrap());
    }

    #[test]
    fn test_a_record_may_only_live_in_one_bucket() {
        let (ten, eleven) = (ArticleKey::new(10), ArticleKey::new(11));
        let mut result = ResultSet::with_articles([ten, eleven]);
        result.push(ten, record("(1/2020)"));
        result.push(eleven, record("(1/2020)"));

        assert!(matches!(
            validate(&[ten, eleven], &result),
            Err(ShapeError::DuplicatedAcrossArticles { .. })
        ));
    }

    #[test]
    fn test_every_requested_article_needs_a_bucket() {
        let (ten, eleven) = (ArticleKey::new(10), ArticleKey::new(11));
        let result = ResultSet::with_articles([ten]);

        assert_eq!(
            validate(&[ten, eleven], &result),
            Err(ShapeError::MissingArticle(eleven))
        );
        assert_eq!(
            validate(&[], &result),
            Err(ShapeError::UnexpectedArticle(ten))
        );
    }
}
