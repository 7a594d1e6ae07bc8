use std::vec::IntoIter;

use lazy_static::lazy_static;
use multipeek::{multipeek, MultiPeek};
use regex::Regex;
use thiserror::Error;

use crate::pdf_reader::content_extractor::token::Token;
use crate::records::{ArticleKey, Record};

mod scanner;
mod token;

lazy_static! {
    static ref ORDER_NUMBER_TAIL: Regex =
        Regex::new(r"^(\d*)\s*\)").expect("ORDER_NUMBER_TAIL regex to compile");
    static ref COMPLETE_ORDER_NUMBER: Regex =
        Regex::new(r"^\(\d+/\d+\)$").expect("COMPLETE_ORDER_NUMBER regex to compile");
}

/// What the listing page said about the document being parsed.
#[derive(Debug, Clone, Copy)]
pub struct DocumentContext<'a> {
    pub article: ArticleKey,
    /// Article headers naming anything else are read as text.
    pub articles: &'a [ArticleKey],
    pub list_name: &'a str,
    pub date: &'a str,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed order number in line {0:?}")]
    MalformedOrderNumber(String),
    #[error("Order number {0:?} is never closed")]
    UnterminatedOrderNumber(String),
    #[error("Year of {date:?} is not numeric, dropping {number_order}")]
    InvalidYear { date: String, number_order: String },
}

#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub records: Vec<(ArticleKey, Record)>,
    pub errors: Vec<ParseError>,
}

/// Turns the text of an order document into records. A record belongs to the
/// nearest article header above it, or to the article of the listing when no
/// header precedes it.
pub fn extract(text: &str, context: DocumentContext) -> ParsedDocument {
    let tokens = scanner::scan(text, context.articles);
    Parser::new(tokens, context).parse()
}

struct Parser<'a> {
    tokens: MultiPeek<IntoIter<Token>>,
    context: DocumentContext<'a>,
    current_article: ArticleKey,
    year: Option<i32>,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, context: DocumentContext<'a>) -> Self {
        let year = context
            .date
            .rsplit('.')
            .next()
            .and_then(|year| year.trim().parse::<i32>().ok());
        Self {
            tokens: multipeek(tokens),
            current_article: context.article,
            context,
            year,
        }
    }

    fn parse(mut self) -> ParsedDocument {
        let mut document = ParsedDocument::default();

        while let Some(token) = self.tokens.next() {
            let order = match token {
                Token::Article(article) => {
                    self.current_article = article;
                    continue;
                }
                Token::Text(_) => continue,
                Token::OrderNumber(order) => Ok(order),
                Token::OpenOrderNumber(head) => self.close_order_number(head),
                Token::MalformedOrderNumber(line) => Err(ParseError::MalformedOrderNumber(line)),
            };

            match order.and_then(|order| self.record(order)) {
                Ok(record) => document.records.push((self.current_article, record)),
                Err(error) => document.errors.push(error),
            }
        }

        document
    }

    /// Joins `(16309/` with a following line starting with `2020)`.
    fn close_order_number(&mut self, head: String) -> Result<String, ParseError> {
        let tail = match self.tokens.peek() {
            Some(Token::Text(text)) => ORDER_NUMBER_TAIL
                .captures(text)
                .map(|captures| format!("{})", &captures[1])),
            _ => None,
        };

        let tail = tail.ok_or_else(|| ParseError::UnterminatedOrderNumber(head.clone()))?;
        let order: String = format!("{head}{tail}")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if !COMPLETE_ORDER_NUMBER.is_match(&order) {
            return Err(ParseError::UnterminatedOrderNumber(head));
        }
        // the tail line has been used up
        self.tokens.next();
        Ok(order)
    }

    fn record(&self, number_order: String) -> Result<Record, ParseError> {
        let year = self.year.ok_or_else(|| ParseError::InvalidYear {
            date: self.context.date.to_string(),
            number_order: number_order.clone(),
        })?;

        Ok(Record {
            list_name: self.context.list_name.to_string(),
            number_order,
            year,
            date: self.context.date.to_string(),
        })
    }
}
