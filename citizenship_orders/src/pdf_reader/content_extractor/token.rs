use crate::records::ArticleKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `Articolul 10`, `art. 1^1` ... scopes the order numbers that follow.
    Article(ArticleKey),
    OrderNumber(String),
    /// An order number cut by a line break, eg: `(16309/`
    OpenOrderNumber(String),
    MalformedOrderNumber(String),
    Text(String),
}
