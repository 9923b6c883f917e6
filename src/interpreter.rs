//! Content stream interpreter
//!
//! Walks parsed operations, tracking the text object scope, the font and a
//! rough vertical position, and accumulates the text shown. Layout is only
//! approximated: vertical moves become newlines and wide horizontal moves
//! become spaces.

use crate::operand::Operand;
use crate::parser::{parse_content, ContentParser, Operation, ParsedContent};
use crate::registry::FontResolver;
use crate::text_state::TextState;
use crate::{Diagnostic, ExtractError, Extraction};
use std::io::Read;

/// Thresholds for turning text positioning into line breaks and spaces
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// A `Tm` whose vertical translation differs from the last line by more
    /// than this fraction of the font size starts a new line
    pub line_break_ratio: f64,
    /// A horizontal-only `Td`/`TD` wider than this inserts a space
    pub word_gap_threshold: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_break_ratio: 0.5,
            word_gap_threshold: 1.0,
        }
    }
}

/// Problem with a single operation. Processing carries on with the next one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperatorError {
    #[error("text showing operator '{0}' outside BT/ET block")]
    TextOutsideTextObject(String),
    #[error("unbalanced 'Q' operator")]
    UnbalancedRestore,
    #[error("{operator} expects {expected} operand(s), got {found}")]
    MissingOperands {
        operator: String,
        expected: usize,
        found: usize,
    },
    #[error("{operator} operand {index} should be a {expected}, got a {found}")]
    WrongOperand {
        operator: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
}

fn is_text_showing(name: &str) -> bool {
    matches!(name, "Tj" | "TJ" | "'" | "\"")
}

fn require(op: &Operation, expected: usize) -> Result<(), OperatorError> {
    if op.operands.len() < expected {
        return Err(OperatorError::MissingOperands {
            operator: op.name.clone(),
            expected,
            found: op.operands.len(),
        });
    }
    Ok(())
}

fn wrong_operand(op: &Operation, index: usize, expected: &'static str) -> OperatorError {
    OperatorError::WrongOperand {
        operator: op.name.clone(),
        index,
        expected,
        found: op.operands[index].kind(),
    }
}

/// Interprets one content stream. Create a new one per stream.
pub struct Interpreter<'f> {
    fonts: &'f dyn FontResolver,
    config: LayoutConfig,
    text: String,
    in_text_object: bool,
    state: TextState,
    stack: Vec<TextState>,
    diagnostics: Vec<Diagnostic>,
}

impl<'f> Interpreter<'f> {
    pub fn new(fonts: &'f dyn FontResolver) -> Self {
        Self::with_config(fonts, LayoutConfig::default())
    }

    pub fn with_config(fonts: &'f dyn FontResolver, config: LayoutConfig) -> Self {
        Self {
            fonts,
            config,
            text: String::new(),
            in_text_object: false,
            state: TextState::default(),
            stack: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Parse a content stream and interpret its operations.
    ///
    /// A malformed array structure or a read failure aborts before any
    /// operation runs; problems with single operands or operations are
    /// recorded as diagnostics.
    pub fn process_stream<R: Read>(&mut self, reader: R) -> Result<(), ExtractError> {
        let content = ContentParser::new(reader).parse()?;
        self.process_content(content);
        Ok(())
    }

    /// [`Interpreter::process_stream`] for a stream already in memory
    pub fn process_bytes(&mut self, data: &[u8]) -> Result<(), ExtractError> {
        let content = parse_content(data)?;
        self.process_content(content);
        Ok(())
    }

    fn process_content(&mut self, content: ParsedContent) {
        self.diagnostics
            .extend(content.skipped.into_iter().map(Diagnostic::SkippedOperand));
        self.process_operations(&content.operations);
    }

    pub fn process_operations(&mut self, operations: &[Operation]) {
        for op in operations {
            if let Err(e) = self.process_operation(op) {
                log::warn!("error processing op '{}': {}", op.name, e);
                self.diagnostics.push(Diagnostic::Operator(e));
            }
        }
    }

    pub fn process_operation(&mut self, op: &Operation) -> Result<(), OperatorError> {
        if !self.in_text_object && is_text_showing(&op.name) {
            return Err(OperatorError::TextOutsideTextObject(op.name.clone()));
        }

        match op.name.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                self.state = self.stack.pop().ok_or(OperatorError::UnbalancedRestore)?;
            }
            "BT" => {
                self.in_text_object = true;
                self.state = TextState::default();
            }
            "ET" => self.in_text_object = false,
            "Tf" => {
                require(op, 2)?;
                let name = op.operands[0]
                    .as_name()
                    .ok_or_else(|| wrong_operand(op, 0, "name"))?;
                let size = op.operands[1]
                    .as_number()
                    .ok_or_else(|| wrong_operand(op, 1, "number"))?;
                self.state.set_font(name, size);
            }
            "Tj" => {
                require(op, 1)?;
                self.show_text(op, 0)?;
            }
            "TJ" => {
                require(op, 1)?;
                let items = op.operands[0]
                    .as_array()
                    .ok_or_else(|| wrong_operand(op, 0, "array"))?;
                for item in items {
                    // numbers are kerning adjustments
                    if let Operand::Text(_) | Operand::Bytes(_) = item {
                        self.append_shown(item);
                    }
                }
            }
            "T*" => self.next_line(),
            "'" => {
                require(op, 1)?;
                self.next_line();
                self.show_text(op, 0)?;
            }
            "\"" => {
                require(op, 3)?;
                self.next_line();
                self.show_text(op, 2)?;
            }
            "Tm" => self.set_text_matrix(op),
            "Td" | "TD" => self.move_text_position(op),
            _ => {}
        }
        Ok(())
    }

    fn next_line(&mut self) {
        self.text.push('\n');
        self.state.last_y -= self.state.font_size;
    }

    fn set_text_matrix(&mut self, op: &Operation) {
        let Some(f) = op.operands.get(5).and_then(Operand::as_number) else {
            log::debug!("ignoring malformed Tm with {} operand(s)", op.operands.len());
            return;
        };
        if (f - self.state.last_y).abs() > self.config.line_break_ratio * self.state.font_size {
            self.text.push('\n');
        }
        self.state.last_y = f;
    }

    fn move_text_position(&mut self, op: &Operation) {
        let tx = op.operands.first().and_then(Operand::as_number);
        let ty = op.operands.get(1).and_then(Operand::as_number);
        let (Some(tx), Some(ty)) = (tx, ty) else {
            log::debug!("ignoring malformed {} with {} operand(s)", op.name, op.operands.len());
            return;
        };
        if ty != 0.0 {
            self.text.push('\n');
            self.state.last_y += ty;
        } else if tx > self.config.word_gap_threshold {
            self.text.push(' ');
        }
    }

    fn show_text(&mut self, op: &Operation, index: usize) -> Result<(), OperatorError> {
        match &op.operands[index] {
            operand @ (Operand::Text(_) | Operand::Bytes(_)) => {
                self.append_shown(operand);
                Ok(())
            }
            _ => Err(wrong_operand(op, index, "string")),
        }
    }

    fn append_shown(&mut self, operand: &Operand) {
        match operand {
            Operand::Text(s) => self.text.push_str(s),
            Operand::Bytes(bytes) => {
                let font = self.fonts.lookup(&self.state.font_name);
                let decoded = font.decode(bytes);
                let count = decoded.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
                if count > 0 {
                    log::debug!("{} unmapped code(s) in font {}", count, font.name);
                    self.diagnostics.push(Diagnostic::UnmappedCodes {
                        font: self.state.font_name.clone(),
                        count,
                    });
                }
                self.text.push_str(&decoded);
            }
            _ => {}
        }
    }

    /// Accumulated text, trimmed, with `\r\n` normalized to `\n`
    pub fn text(&self) -> String {
        self.text.trim().replace("\r\n", "\n")
    }

    pub fn text_state(&self) -> &TextState {
        &self.state
    }

    pub fn in_text_object(&self) -> bool {
        self.in_text_object
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn into_extraction(self) -> Extraction {
        Extraction {
            text: self.text(),
            diagnostics: self.diagnostics,
        }
    }
}
