//! Arithmetic expression evaluator
//!
//! Supports `+ - * / % ^`, parentheses, unary minus, the constants `pi` and
//! `e`, and a handful of single-argument functions.

use async_trait::async_trait;

use crate::core::{ConclaveError, Result, ToolCall, ToolCategory, ToolDefinition};
use crate::tools::Tool;

/// Tool for evaluating arithmetic expressions
#[derive(Debug, Clone, Default)]
pub struct Calculator;

impl Calculator {
    /// Create a new instance
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Scientific notation such as 1.5e3
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ConclaveError::validation(format!("invalid number '{}'", text)))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                // Accept ** as power
                if c == '*' && chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Op('^'));
                    i += 2;
                } else {
                    tokens.push(Token::Op(c));
                    i += 1;
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => i += 1,
            other => {
                return Err(ConclaveError::validation(format!(
                    "unexpected character '{}' in expression",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

/// Deepest nesting of parentheses, signs and exponents the parser accepts
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err(ConclaveError::validation("division by zero")),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    // unary := '-' unary | '+' unary | power
    //
    // Every nested parenthesis, sign and exponent passes through here, so
    // this is where recursion depth is bounded.
    fn unary(&mut self) -> Result<f64> {
        if self.depth >= MAX_DEPTH {
            return Err(ConclaveError::validation("expression nested too deeply"));
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := primary ('^' unary)?   (right associative)
    fn power(&mut self) -> Result<f64> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(ConclaveError::validation("missing closing parenthesis")),
                }
            }
            Some(Token::Ident(name)) => self.identifier(&name),
            Some(token) => Err(ConclaveError::validation(format!(
                "unexpected token {:?}",
                token
            ))),
            None => Err(ConclaveError::validation("unexpected end of expression")),
        }
    }

    fn identifier(&mut self, name: &str) -> Result<f64> {
        match name {
            "pi" => return Ok(std::f64::consts::PI),
            "e" => return Ok(std::f64::consts::E),
            _ => {}
        }

        if self.next() != Some(Token::LParen) {
            return Err(ConclaveError::validation(format!("unknown name '{}'", name)));
        }
        let arg = self.expr()?;
        if self.next() != Some(Token::RParen) {
            return Err(ConclaveError::validation("missing closing parenthesis"));
        }

        let value = match name {
            "sqrt" if arg < 0.0 => {
                return Err(ConclaveError::validation("square root of a negative number"))
            }
            "sqrt" => arg.sqrt(),
            "abs" => arg.abs(),
            "ln" | "log" => arg.ln(),
            "log10" => arg.log10(),
            "log2" => arg.log2(),
            "exp" => arg.exp(),
            "sin" => arg.sin(),
            "cos" => arg.cos(),
            "tan" => arg.tan(),
            "floor" => arg.floor(),
            "ceil" => arg.ceil(),
            "round" => arg.round(),
            other => {
                return Err(ConclaveError::validation(format!(
                    "unknown function '{}'",
                    other
                )))
            }
        };
        Ok(value)
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate(expression: &str) -> Result<f64> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ConclaveError::validation("empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(ConclaveError::validation(format!(
            "unexpected trailing input in '{}'",
            expression
        )));
    }
    if !value.is_finite() {
        return Err(ConclaveError::validation("result is not a finite number"));
    }
    Ok(value)
}

/// Render without a trailing `.0` for whole numbers
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[async_trait]
impl Tool for Calculator {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "calculator",
            "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses, pi, e, \
             sqrt, abs, ln, log10, log2, exp, sin, cos, tan, floor, ceil, round",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Expression to evaluate, e.g. (3 + 4) * 2 ^ 3"
                    }
                },
                "required": ["expression"]
            }),
        )
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Expert
    }

    async fn call(&self, call: &ToolCall) -> Result<String> {
        let expression = call.require_string("expression")?;
        Ok(format_number(evaluate(&expression)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(evaluate("1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), -4.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("17 % 5").unwrap(), 2.0);
        assert_eq!(evaluate("2 ** 10").unwrap(), 1024.0);
    }

    #[test]
    fn test_functions_and_constants() {
        assert_eq!(evaluate("sqrt(16) + abs(-2)").unwrap(), 6.0);
        assert!((evaluate("cos(pi)").unwrap() + 1.0).abs() < 1e-12);
        assert!((evaluate("ln(e)").unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(evaluate("1.5e3").unwrap(), 1500.0);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("foo(1)").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("1 2").is_err());
        assert!(evaluate("sqrt(-1)").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let err = evaluate(&parens).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));

        let signs = format!("{}1", "-".repeat(100_000));
        assert!(evaluate(&signs).is_err());

        let powers = format!("2{}", "^1".repeat(100_000));
        assert!(evaluate(&powers).is_err());

        let nested = format!("{}2{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(evaluate(&nested).unwrap(), 2.0);
    }

    #[tokio::test]
    async fn test_tool_reports_deep_nesting_as_error() {
        let expression = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let call = ToolCall::new("calculator", serde_json::json!({ "expression": expression }));
        assert!(Calculator::new().call(&call).await.is_err());
    }

    #[tokio::test]
    async fn test_tool_formats_integers() {
        let call = ToolCall::new("calculator", serde_json::json!({"expression": "6 * 7"}));
        assert_eq!(Calculator::new().call(&call).await.unwrap(), "42");

        let call = ToolCall::new("calculator", serde_json::json!({"expression": "1 / 4"}));
        assert_eq!(Calculator::new().call(&call).await.unwrap(), "0.25");
    }
}
