//! Simple-response workflow: tool-assisted conversational replies.
//!
//! Runs a fixed phase sequence per message. Tool selection is keyword driven
//! and the registered tool set is closed: current-time lookup and a guarded
//! arithmetic evaluator. Anything else goes straight to the model.

use chrono::Local;
use tracing::{debug, info};

use crate::config::OrchestratorConfig;
use crate::model::{CompletionRequest, ModelClient};
use crate::sdk::{Message, OrchestratorError, ProgressSender, WorkflowEvent};

const SYSTEM_PROMPT: &str = "You are a helpful assistant for general conversation. \
You can answer questions, help with simple calculations, provide the current time, \
and help with general tasks. Be helpful, accurate, and conversational. \
Keep responses concise but informative.";

const TOTAL_PHASES: usize = 3;

/// Phases of a single simple-chat turn, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Start,
    ToolSelection,
    ToolInvocation,
    Respond,
    Done,
}

impl ChatPhase {
    pub fn name(&self) -> &'static str {
        match self {
            ChatPhase::Start => "start",
            ChatPhase::ToolSelection => "tool_selection",
            ChatPhase::ToolInvocation => "tool_invocation",
            ChatPhase::Respond => "respond",
            ChatPhase::Done => "done",
        }
    }
}

/// The closed set of tools a simple-chat turn may invoke.
#[derive(Debug, Clone, PartialEq)]
enum ToolCall {
    CurrentTime,
    Calculate(String),
}

/// Run one simple-chat turn and return the final response text.
pub async fn run(
    model: &dyn ModelClient,
    config: &OrchestratorConfig,
    history: &[Message],
    text: &str,
    progress: &ProgressSender,
) -> Result<String, OrchestratorError> {
    let mut phase = ChatPhase::Start;
    debug!(phase = phase.name(), "simple chat turn starting");

    phase = ChatPhase::ToolSelection;
    progress.send(WorkflowEvent::PhaseStarted {
        phase: phase.name().to_string(),
        total_phases: TOTAL_PHASES,
    });
    let tool = select_tool(text);
    progress.send(WorkflowEvent::PhaseCompleted {
        phase: phase.name().to_string(),
    });

    let tool_output = match &tool {
        Some(call) => {
            phase = ChatPhase::ToolInvocation;
            progress.send(WorkflowEvent::PhaseStarted {
                phase: phase.name().to_string(),
                total_phases: TOTAL_PHASES,
            });
            let output = invoke_tool(call)?;
            info!(tool = ?call, "tool invoked");
            progress.send(WorkflowEvent::PhaseCompleted {
                phase: phase.name().to_string(),
            });
            Some(output)
        }
        None => None,
    };

    phase = ChatPhase::Respond;
    progress.send(WorkflowEvent::PhaseStarted {
        phase: phase.name().to_string(),
        total_phases: TOTAL_PHASES,
    });

    let window = history.len().saturating_sub(config.history_window);
    let request = CompletionRequest::new(SYSTEM_PROMPT, text)
        .with_history(history[window..].to_vec());
    let model_text = tokio::time::timeout(config.model_timeout(), model.complete(request))
        .await
        .map_err(|_| OrchestratorError::Timeout {
            operation: "simple chat model call".to_string(),
        })??;

    let response = match tool_output {
        Some(output) => format!("{model_text}\n\n{output}"),
        None => model_text,
    };

    progress.send(WorkflowEvent::PhaseCompleted {
        phase: phase.name().to_string(),
    });
    phase = ChatPhase::Done;
    debug!(phase = phase.name(), "simple chat turn finished");

    Ok(response)
}

fn select_tool(text: &str) -> Option<ToolCall> {
    let lower = text.to_lowercase();
    if lower.contains("what time") || lower.contains("current time") || lower.contains("the date")
    {
        return Some(ToolCall::CurrentTime);
    }
    if let Some(expression) = extract_expression(text) {
        return Some(ToolCall::Calculate(expression));
    }
    None
}

fn invoke_tool(call: &ToolCall) -> Result<String, OrchestratorError> {
    match call {
        ToolCall::CurrentTime => Ok(format!(
            "Current time: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )),
        ToolCall::Calculate(expression) => {
            let value = evaluate(expression)?;
            Ok(format!(
                "The result of {} is {}",
                expression,
                format_number(value)
            ))
        }
    }
}

/// Pull the longest run of arithmetic-legal characters out of free text.
/// Returns `None` unless the run contains a digit and an operator, so plain
/// prose with a stray number is not mistaken for a calculation request.
fn extract_expression(text: &str) -> Option<String> {
    let mut best: Option<String> = None;
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || "+-*/(). ".contains(c) {
            current.push(c);
        } else {
            consider_candidate(&mut best, &current);
            current.clear();
        }
    }
    consider_candidate(&mut best, &current);
    best
}

fn consider_candidate(best: &mut Option<String>, candidate: &str) {
    let trimmed = candidate.trim().trim_end_matches('.').trim();
    let has_digit = trimmed.chars().any(|c| c.is_ascii_digit());
    let has_operator = trimmed.chars().any(|c| "+-*/".contains(c));
    if has_digit && has_operator {
        let longer = best.as_ref().map_or(true, |b| trimmed.len() > b.len());
        if longer {
            *best = Some(trimmed.to_string());
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Evaluate an arithmetic expression over `+ - * / ( )` and numeric literals.
///
/// Recursive descent with standard precedence. Any other byte, dangling
/// input, or division by zero is an `InvalidExpression`.
pub fn evaluate(expression: &str) -> Result<f64, OrchestratorError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(OrchestratorError::InvalidExpression(
            expression.to_string(),
        ));
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        source: expression,
    };
    let value = parser.expr()?;
    if parser.pos != tokens.len() {
        return Err(OrchestratorError::InvalidExpression(
            expression.to_string(),
        ));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, OrchestratorError> {
    let invalid = || OrchestratorError::InvalidExpression(expression.to_string());
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = literal.parse().map_err(|_| invalid())?;
                tokens.push(Token::Number(value));
            }
            _ => return Err(invalid()),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn invalid(&self) -> OrchestratorError {
        OrchestratorError::InvalidExpression(self.source.to_string())
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<f64, OrchestratorError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.advance();
                    value += self.term()?;
                }
                Token::Minus => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, OrchestratorError> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.advance();
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.advance();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(self.invalid());
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, OrchestratorError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Minus) => Ok(-self.factor()?),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(self.invalid()),
                }
            }
            _ => Err(self.invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TemplateModel;

    #[test]
    fn test_evaluate_precedence() {
        assert_eq!(evaluate("25 * 4 + 10").unwrap(), 110.0);
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
    }

    #[test]
    fn test_evaluate_unary_minus_and_floats() {
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("1.5 * 2").unwrap(), 3.0);
    }

    #[test]
    fn test_evaluate_rejects_identifiers() {
        assert!(matches!(
            evaluate("import os"),
            Err(OrchestratorError::InvalidExpression(_))
        ));
        assert!(evaluate("x + 1").is_err());
        assert!(evaluate("pow(2, 3)").is_err());
    }

    #[test]
    fn test_evaluate_rejects_division_by_zero() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("5 / (3 - 3)").is_err());
    }

    #[test]
    fn test_evaluate_rejects_dangling_input() {
        assert!(evaluate("1 +").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("").is_err());
    }

    #[test]
    fn test_extract_expression_from_prose() {
        assert_eq!(
            extract_expression("Calculate 25 * 4 + 10"),
            Some("25 * 4 + 10".to_string())
        );
        assert_eq!(extract_expression("I have 3 cats"), None);
        assert_eq!(extract_expression("hello there"), None);
    }

    #[test]
    fn test_select_tool_time() {
        assert_eq!(select_tool("What time is it?"), Some(ToolCall::CurrentTime));
        assert_eq!(select_tool("tell me a story"), None);
    }

    #[tokio::test]
    async fn test_run_appends_calculation_result() {
        let model = TemplateModel::new();
        let config = OrchestratorConfig::default();
        let response = run(
            &model,
            &config,
            &[],
            "Calculate 25 * 4 + 10",
            &ProgressSender::noop(),
        )
        .await
        .unwrap();
        assert!(response.contains("The result of 25 * 4 + 10 is 110"));
    }

    #[tokio::test]
    async fn test_run_plain_chat_uses_model_only() {
        let model = TemplateModel::new();
        let config = OrchestratorConfig::default();
        let response = run(
            &model,
            &config,
            &[],
            "tell me about rust",
            &ProgressSender::noop(),
        )
        .await
        .unwrap();
        assert!(!response.is_empty());
        assert!(!response.contains("The result of"));
    }
}
