use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use crate::pdf_reader::content_extractor::token::Token;
use crate::records::{ArticleKey, ORDER_NUMBER};

lazy_static! {
    static ref ARTICLE_HEADER: Regex =
        RegexBuilder::new(r"^(?:articolul|art\.)\s*(\d+)(?:\s*\^\s*(\d+))?\b")
            .case_insensitive(true)
            .build()
            .expect("ARTICLE_HEADER regex to compile");
    static ref OPEN_ORDER_NUMBER: Regex =
        Regex::new(r"\(\s*\d+\s*/?\s*\d*\s*$").expect("OPEN_ORDER_NUMBER regex to compile");
    static ref ORDER_NUMBER_START: Regex =
        Regex::new(r"\(\s*\d+\s*/").expect("ORDER_NUMBER_START regex to compile");
}

/// Only headers naming one of `articles` open a new scope; the operative
/// `Art. 1. - Se acordă cetățenia ...` line of every order is plain text.
fn article(line: &str, articles: &[ArticleKey]) -> Option<ArticleKey> {
    let captures = ARTICLE_HEADER.captures(line)?;
    // `art. 1^1` is article 11
    let number = match captures.get(2) {
        Some(superscript) => format!("{}{}", &captures[1], superscript.as_str()),
        None => captures[1].to_string(),
    };
    number
        .parse()
        .ok()
        .map(ArticleKey::new)
        .filter(|article| articles.contains(article))
}

fn scan_line(line: &str, articles: &[ArticleKey]) -> Option<Token> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(article) = article(line, articles) {
        return Some(Token::Article(article));
    }

    // one order per table row: the first match wins
    if let Some(order) = ORDER_NUMBER.find(line) {
        return Some(Token::OrderNumber(order.as_str().to_string()));
    }

    if let Some(open) = OPEN_ORDER_NUMBER.find(line) {
        return Some(Token::OpenOrderNumber(open.as_str().to_string()));
    }

    if ORDER_NUMBER_START.is_match(line) {
        return Some(Token::MalformedOrderNumber(line.to_string()));
    }

    Some(Token::Text(line.to_string()))
}

pub fn scan(text: &str, articles: &[ArticleKey]) -> Vec<Token> {
    text.lines()
        .filter_map(|line| scan_line(line, articles))
        .collect()
}
