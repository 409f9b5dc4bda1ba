//! Tool blocks that sit alongside retrieval in the prompt.
//!
//! | Tool | Block content |
//! |------|---------------|
//! | Web search | top 3 results from `GET /api/search`, one per line |
//! | Weather | always empty (placeholder) |
//! | Calculator | `"<expr> => <result>"` for arithmetic found in the message |
//!
//! Tool failures never abort a message: they log a warning and contribute
//! an empty block.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::config::{SearchConfig, ToolsConfig};

/// Number of web results placed in the prompt.
const WEB_RESULTS: usize = 3;

/// Filled tool blocks for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolBlocks {
    pub web: String,
    pub weather: String,
    pub calculator: String,
}

/// Run every enabled tool against the user's message.
pub async fn run_tools(tools: &ToolsConfig, search: &SearchConfig, text: &str) -> ToolBlocks {
    let mut blocks = ToolBlocks::default();

    if tools.web_search {
        blocks.web = web_search(search, text).await;
    }
    if tools.weather {
        blocks.weather = weather_block(text);
    }
    if tools.calculator {
        blocks.calculator = calculator_block(text);
    }

    blocks
}

// ============ Web search ============

/// Response shape of the search proxy (and the upstream API it forwards).
#[derive(Debug, Deserialize, Default)]
pub struct SearchResponse {
    #[serde(default)]
    pub web: Option<WebResults>,
}

#[derive(Debug, Deserialize, Default)]
pub struct WebResults {
    #[serde(default)]
    pub results: Vec<WebResult>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

/// Query the search proxy and format its results. Any failure yields `""`.
pub async fn web_search(config: &SearchConfig, query: &str) -> String {
    match fetch_web_results(config, query).await {
        Ok(response) => format_web_results(&response),
        Err(e) => {
            tracing::warn!(error = %e, "web search failed");
            String::new()
        }
    }
}

async fn fetch_web_results(config: &SearchConfig, query: &str) -> Result<SearchResponse> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let response = client
        .get(&config.proxy_url)
        .query(&[("q", query)])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        bail!("search proxy returned {}", status);
    }

    Ok(response.json().await?)
}

/// `"[Web Result] <title>: <description> (<url>)"` for the top results.
pub fn format_web_results(response: &SearchResponse) -> String {
    let Some(web) = &response.web else {
        return String::new();
    };
    web.results
        .iter()
        .take(WEB_RESULTS)
        .map(|r| format!("[Web Result] {}: {} ({})", r.title, r.description, r.url))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============ Weather ============

/// No weather source is wired up; the block is reserved in the prompt.
pub fn weather_block(_text: &str) -> String {
    String::new()
}

// ============ Calculator ============

/// Extract an arithmetic expression from `text` and evaluate it.
///
/// Number words are rewritten (`times`, `divided by`, `plus`, `minus`),
/// then every character other than digits, `+-*/().` is dropped. Returns an
/// empty string when nothing remains or the expression does not evaluate
/// to a finite number.
pub fn calculator_block(text: &str) -> String {
    let expr = extract_expression(text);
    if expr.trim().is_empty() {
        return String::new();
    }
    match evaluate(&expr) {
        Ok(value) if value.is_finite() => format!("{} => {}", expr, value),
        _ => String::new(),
    }
}

fn extract_expression(text: &str) -> String {
    text.to_lowercase()
        .replace("times", "*")
        .replace("divided by", "/")
        .replace("plus", "+")
        .replace("minus", "-")
        .chars()
        .filter(|c| c.is_ascii_digit() || "+-*/().".contains(*c))
        .collect()
}

/// Evaluate `+ - * / **` with parentheses and unary signs.
pub fn evaluate(expr: &str) -> Result<f64> {
    let mut parser = Parser {
        chars: expr.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.chars.len() {
        bail!("unexpected '{}' at {}", parser.chars[parser.pos], parser.pos);
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.power()?;
        loop {
            if self.peek() == Some('*') && self.chars.get(self.pos + 1) != Some(&'*') {
                self.pos += 1;
                value *= self.power()?;
            } else if self.eat('/') {
                value /= self.power()?;
            } else {
                return Ok(value);
            }
        }
    }

    // `**` is right-associative and binds tighter than `*`.
    fn power(&mut self) -> Result<f64> {
        let base = self.unary()?;
        if self.peek() == Some('*') && self.chars.get(self.pos + 1) == Some(&'*') {
            self.pos += 2;
            let exponent = self.power()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64> {
        if self.eat('-') {
            return Ok(-self.unary()?);
        }
        if self.eat('+') {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<f64> {
        if self.eat('(') {
            let value = self.expr()?;
            if !self.eat(')') {
                bail!("missing ')'");
            }
            return Ok(value);
        }

        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        if start == self.pos {
            match self.peek() {
                Some(c) => bail!("unexpected '{}' at {}", c, self.pos),
                None => bail!("unexpected end of expression"),
            }
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("invalid number '{}'", literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculator_words() {
        assert_eq!(calculator_block("What is 12 times 3?"), "12*3 => 36");
        assert_eq!(calculator_block("10 divided by 4"), "10/4 => 2.5");
        assert_eq!(calculator_block("7 plus 8 minus 5"), "7+8-5 => 10");
    }

    #[test]
    fn test_calculator_precedence_and_parens() {
        assert_eq!(calculator_block("2+3*4"), "2+3*4 => 14");
        assert_eq!(calculator_block("(2+3)*4"), "(2+3)*4 => 20");
        assert_eq!(calculator_block("2**3**2"), "2**3**2 => 512");
        assert_eq!(calculator_block("-3*-2"), "-3*-2 => 6");
    }

    #[test]
    fn test_calculator_no_math() {
        assert_eq!(calculator_block("hello there"), "");
        assert_eq!(calculator_block("   "), "");
    }

    #[test]
    fn test_calculator_invalid_or_infinite() {
        assert_eq!(calculator_block("1.2.3"), "");
        assert_eq!(calculator_block("(1+2"), "");
        assert_eq!(calculator_block("1/0"), "");
        assert_eq!(calculator_block("5 plus"), "");
    }

    #[test]
    fn test_calculator_lone_number() {
        assert_eq!(calculator_block("I have 3 cats"), "3 => 3");
    }

    #[test]
    fn test_format_web_results_top_three() {
        let json = serde_json::json!({
            "web": { "results": [
                {"title": "A", "description": "first", "url": "https://a"},
                {"title": "B", "description": "second", "url": "https://b"},
                {"title": "C", "description": "third", "url": "https://c"},
                {"title": "D", "description": "fourth", "url": "https://d"}
            ]}
        });
        let response: SearchResponse = serde_json::from_value(json).unwrap();
        assert_eq!(
            format_web_results(&response),
            "[Web Result] A: first (https://a)\n\
             [Web Result] B: second (https://b)\n\
             [Web Result] C: third (https://c)"
        );
    }

    #[test]
    fn test_format_web_results_missing() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(format_web_results(&response), "");
    }

    #[tokio::test]
    async fn test_web_search_unreachable_is_empty() {
        let config = SearchConfig {
            proxy_url: "http://127.0.0.1:9/api/search".to_string(),
            timeout_secs: 2,
            ..SearchConfig::default()
        };
        assert_eq!(web_search(&config, "rust").await, "");
    }

    #[tokio::test]
    async fn test_disabled_tools_are_empty() {
        let blocks = run_tools(&ToolsConfig::default(), &SearchConfig::default(), "2 plus 2").await;
        assert_eq!(blocks, ToolBlocks::default());
    }
}
