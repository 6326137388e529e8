//! Redcode source parser.
//!
//! Syntax:
//! ```text
//! ;name Dwarf                 ; metadata comment
//! ;author A. K. Dewdney
//! target  DAT.F   #0, #0      ; labelled instruction
//! start   ADD.AB  #4, target  ; label operands resolve to line offsets
//!         MOV.I   target, @target
//!         JMP.B   start
//!         ORG     start       ; entry point (END start also works)
//! ```
//!
//! Two passes, like any small assembler: pass one collects labels and
//! emits instructions with placeholder values for label operands, pass
//! two patches the placeholders with signed line offsets.

use std::collections::HashMap;

use thiserror::Error;

use crate::point::Point;
use crate::redcode::instruction::{AddressMode, Instruction, Modifier, Opcode, Operand, Stepping};
use crate::redcode::warrior::Warrior;

/// Parse Redcode source into a warrior image.
pub fn parse(source: &str) -> Result<Warrior, ParseError> {
    Parser::default().parse(source)
}

/// Errors produced while parsing Redcode. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: unknown opcode '{mnemonic}'")]
    UnknownOpcode { line: usize, mnemonic: String },

    #[error("line {line}: unknown modifier '{token}'")]
    UnknownModifier { line: usize, token: String },

    #[error("line {line}: unknown stepping modifier '{token}'")]
    UnknownStepping { line: usize, token: String },

    #[error("line {line}: malformed operand '{token}'")]
    BadOperand { line: usize, token: String },

    #[error("line {line}: {opcode} requires an operand")]
    MissingOperand { line: usize, opcode: String },

    #[error("line {line}: integer out of range in '{token}'")]
    ExpressionOverflow { line: usize, token: String },

    #[error("line {line}: unresolved label '{label}'")]
    UnresolvedLabel { line: usize, label: String },

    #[error("line {line}: duplicate label '{label}'")]
    DuplicateLabel { line: usize, label: String },

    #[error("line {line}: malformed {op}: {message}")]
    MalformedPseudoOp { line: usize, op: String, message: String },

    #[error("source contains no instructions")]
    EmptyWarrior,
}

/// An operand expression before label resolution.
enum Expr {
    Literal(Point),
    Label { name: String, offset: i32 },
}

/// Which operand of an instruction a pending label belongs to.
#[derive(Clone, Copy)]
enum Field {
    A,
    B,
}

/// A label use awaiting pass two.
struct LabelUse {
    instruction: usize,
    field: Field,
    name: String,
    offset: i32,
    line: usize,
}

/// Where execution starts, as written in the source.
enum StartRef {
    Index(i32),
    Label { name: String, line: usize },
}

enum Flow {
    Continue,
    Stop,
}

#[derive(Default)]
struct Parser {
    /// Label -> instruction index.
    labels: HashMap<String, usize>,
    pending: Vec<LabelUse>,
    output: Vec<Instruction>,
    start: Option<StartRef>,
    name: Option<String>,
    author: Option<String>,
    version: Option<String>,
    date: Option<String>,
    strategy: Vec<String>,
}

impl Parser {
    fn parse(mut self, source: &str) -> Result<Warrior, ParseError> {
        for (index, raw) in source.lines().enumerate() {
            match self.process_line(raw, index + 1)? {
                Flow::Continue => {}
                Flow::Stop => break,
            }
        }

        if self.output.is_empty() {
            return Err(ParseError::EmptyWarrior);
        }

        self.resolve_labels()?;
        let start = self.resolve_start()?;

        Ok(Warrior {
            name: self.name.unwrap_or_else(|| "Unnamed".to_string()),
            author: self.author.unwrap_or_else(|| "Anonymous".to_string()),
            version: self.version,
            date: self.date,
            strategy: if self.strategy.is_empty() {
                None
            } else {
                Some(self.strategy.join("\n"))
            },
            instructions: self.output,
            start,
        })
    }

    fn process_line(&mut self, raw: &str, line: usize) -> Result<Flow, ParseError> {
        let mut text = raw.trim();
        if text.is_empty() {
            return Ok(Flow::Continue);
        }

        if let Some(comment) = text.strip_prefix(';') {
            self.process_metadata(comment);
            return Ok(Flow::Continue);
        }

        // Strip the trailing comment.
        if let Some(split) = text.find(';') {
            text = text[..split].trim_end();
        }
        if text.is_empty() {
            return Ok(Flow::Continue);
        }

        // Peel off labels until we hit a pseudo-op or an instruction.
        loop {
            let (word, rest) = split_first_word(text);

            if word.eq_ignore_ascii_case("ORG") {
                let arg = rest.trim();
                if arg.is_empty() {
                    return Err(ParseError::MalformedPseudoOp {
                        line,
                        op: "ORG".to_string(),
                        message: "missing start address".to_string(),
                    });
                }
                self.start = Some(self.parse_start_ref(arg, "ORG", line)?);
                return Ok(Flow::Continue);
            }

            if word.eq_ignore_ascii_case("END") {
                let arg = rest.trim();
                if !arg.is_empty() {
                    self.start = Some(self.parse_start_ref(arg, "END", line)?);
                }
                return Ok(Flow::Stop);
            }

            let mnemonic = word.split('.').next().unwrap_or(word);
            if Opcode::from_mnemonic(mnemonic).is_some() {
                self.parse_instruction(word, rest, line)?;
                return Ok(Flow::Continue);
            }

            // Not an opcode: must be a label for the next instruction.
            let label = word.strip_suffix(':').unwrap_or(word);
            if !is_identifier(label) {
                return Err(ParseError::UnknownOpcode {
                    line,
                    mnemonic: word.to_string(),
                });
            }
            if self.labels.insert(label.to_string(), self.output.len()).is_some() {
                return Err(ParseError::DuplicateLabel {
                    line,
                    label: label.to_string(),
                });
            }

            text = rest.trim();
            if text.is_empty() {
                return Ok(Flow::Continue);
            }
        }
    }

    /// Recognise `;name`, `;author`, `;version`, `;date` and
    /// `;strategy`/`;strat` info comments; anything else is noise.
    fn process_metadata(&mut self, comment: &str) {
        if let Some(value) = meta_value(comment, "name") {
            self.name = Some(value.to_string());
        } else if let Some(value) = meta_value(comment, "author") {
            self.author = Some(value.to_string());
        } else if let Some(value) = meta_value(comment, "version") {
            self.version = Some(value.to_string());
        } else if let Some(value) = meta_value(comment, "date") {
            self.date = Some(value.to_string());
        } else if let Some(value) =
            meta_value(comment, "strategy").or_else(|| meta_value(comment, "strat"))
        {
            self.strategy.push(value.to_string());
        }
    }

    fn parse_start_ref(&self, arg: &str, op: &str, line: usize) -> Result<StartRef, ParseError> {
        if let Ok(index) = arg.parse::<i32>() {
            return Ok(StartRef::Index(index));
        }
        if is_identifier(arg) {
            return Ok(StartRef::Label {
                name: arg.to_string(),
                line,
            });
        }
        Err(ParseError::MalformedPseudoOp {
            line,
            op: op.to_string(),
            message: format!("expected label or integer, found '{arg}'"),
        })
    }

    fn parse_instruction(
        &mut self,
        opcode_token: &str,
        operand_text: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        let mut dotted = opcode_token.split('.');
        let mnemonic = dotted.next().unwrap_or(opcode_token);
        let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| ParseError::UnknownOpcode {
            line,
            mnemonic: mnemonic.to_string(),
        })?;

        // Modifier and stepping are both optional; their tokens never
        // collide, so `MOV.S` means stepping S with a defaulted modifier.
        let mut modifier = None;
        let mut stepping = None;
        for part in dotted {
            if modifier.is_none() && stepping.is_none() {
                if let Some(m) = Modifier::from_token(part) {
                    modifier = Some(m);
                    continue;
                }
            }
            if stepping.is_none() {
                if let Some(s) = Stepping::from_token(part) {
                    stepping = Some(s);
                    continue;
                }
            }
            return Err(if modifier.is_none() && stepping.is_none() {
                ParseError::UnknownModifier {
                    line,
                    token: part.to_string(),
                }
            } else {
                ParseError::UnknownStepping {
                    line,
                    token: part.to_string(),
                }
            });
        }

        let mut operands = Vec::new();
        let operand_text = operand_text.trim();
        if !operand_text.is_empty() {
            for part in operand_text.split(',') {
                if operands.len() == 2 {
                    return Err(ParseError::BadOperand {
                        line,
                        token: part.trim().to_string(),
                    });
                }
                operands.push(self.parse_operand(part, line)?);
            }
        }

        if operands.is_empty() && opcode != Opcode::Nop {
            return Err(ParseError::MissingOperand {
                line,
                opcode: opcode.mnemonic().to_string(),
            });
        }

        let mut drained = operands.into_iter();
        let a = self.bind_operand(drained.next(), Field::A, line);
        let b = self.bind_operand(drained.next(), Field::B, line);
        let modifier = modifier.unwrap_or_else(|| Modifier::default_for(opcode, a.mode, b.mode));

        self.output.push(Instruction {
            opcode,
            modifier,
            stepping: stepping.unwrap_or_default(),
            a,
            b,
        });
        Ok(())
    }

    /// Turn a parsed operand into its final form, registering label uses
    /// for pass two. A missing operand defaults to `$0`.
    fn bind_operand(
        &mut self,
        parsed: Option<(AddressMode, Expr)>,
        field: Field,
        line: usize,
    ) -> Operand {
        match parsed {
            None => Operand::direct(0),
            Some((mode, Expr::Literal(value))) => Operand::new(mode, value),
            Some((mode, Expr::Label { name, offset })) => {
                self.pending.push(LabelUse {
                    instruction: self.output.len(),
                    field,
                    name,
                    offset,
                    line,
                });
                Operand::new(mode, Point::ZERO)
            }
        }
    }

    fn parse_operand(&self, part: &str, line: usize) -> Result<(AddressMode, Expr), ParseError> {
        let token = part.trim();
        let bad = || ParseError::BadOperand {
            line,
            token: token.to_string(),
        };

        let mut expr = token;
        let mut mode = AddressMode::Direct;
        if let Some(first) = token.chars().next() {
            if let Some(explicit) = AddressMode::from_sigil(first) {
                mode = explicit;
                expr = token[first.len_utf8()..].trim_start();
            }
        }
        if expr.is_empty() {
            return Err(bad());
        }

        let leading = expr.chars().next().unwrap();
        if leading.is_ascii_alphabetic() || leading == '_' {
            // Label, optionally composed with a signed offset.
            let (name, offset) = match expr.find(['+', '-']) {
                None => (expr, 0),
                Some(split) => {
                    let tail: String = expr[split..].chars().filter(|c| !c.is_whitespace()).collect();
                    let offset = tail.parse::<i32>().map_err(|_| bad())?;
                    (expr[..split].trim_end(), offset)
                }
            };
            if !is_identifier(name) {
                return Err(bad());
            }
            Ok((
                mode,
                Expr::Label {
                    name: name.to_string(),
                    offset,
                },
            ))
        } else {
            match expr.parse::<Point>() {
                Ok(value) => Ok((mode, Expr::Literal(value))),
                Err(_) if looks_numeric(expr) => Err(ParseError::ExpressionOverflow {
                    line,
                    token: token.to_string(),
                }),
                Err(_) => Err(bad()),
            }
        }
    }

    /// Pass two: patch label operands with signed line offsets.
    fn resolve_labels(&mut self) -> Result<(), ParseError> {
        for used in &self.pending {
            let target = self.labels.get(&used.name).ok_or_else(|| {
                ParseError::UnresolvedLabel {
                    line: used.line,
                    label: used.name.clone(),
                }
            })?;
            let delta = *target as i32 - used.instruction as i32 + used.offset;
            let instruction = &mut self.output[used.instruction];
            match used.field {
                Field::A => instruction.a.value = Point::new(delta, 0),
                Field::B => instruction.b.value = Point::new(delta, 0),
            }
        }
        Ok(())
    }

    fn resolve_start(&self) -> Result<i32, ParseError> {
        match &self.start {
            None => Ok(0),
            Some(StartRef::Index(index)) => Ok(*index),
            Some(StartRef::Label { name, line }) => self
                .labels
                .get(name)
                .map(|index| *index as i32)
                .ok_or_else(|| ParseError::UnresolvedLabel {
                    line: *line,
                    label: name.clone(),
                }),
        }
    }
}

fn split_first_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(split) => (&text[..split], &text[split..]),
        None => (text, ""),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// True when `expr` is shaped like a number or 2D point literal, so a
/// parse failure means overflow rather than garbage.
fn looks_numeric(expr: &str) -> bool {
    expr.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ':' | ';') || c.is_whitespace())
}

/// `;name value` style info comment, case-insensitive key.
fn meta_value<'a>(comment: &'a str, key: &str) -> Option<&'a str> {
    let comment = comment.trim_start();
    if comment.len() <= key.len() || !comment[..key.len()].eq_ignore_ascii_case(key) {
        return None;
    }
    let rest = &comment[key.len()..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_imp() {
        let warrior = parse("MOV.I $0, $1").unwrap();
        assert_eq!(warrior.len(), 1);
        assert_eq!(
            warrior.instructions[0],
            Instruction {
                opcode: Opcode::Mov,
                modifier: Modifier::I,
                stepping: Stepping::D,
                a: Operand::direct(0),
                b: Operand::direct(1),
            }
        );
        assert_eq!(warrior.start, 0);
    }

    #[test]
    fn test_defaults_applied() {
        // No modes: direct. No modifier: from the ICWS-88 table.
        let warrior = parse("MOV 0, 1").unwrap();
        assert_eq!(warrior.instructions[0].modifier, Modifier::I);
        assert_eq!(warrior.instructions[0].a.mode, AddressMode::Direct);

        let warrior = parse("ADD #4, 3").unwrap();
        assert_eq!(warrior.instructions[0].modifier, Modifier::Ab);

        // Single operand: B defaults to $0.
        let warrior = parse("JMP -2").unwrap();
        assert_eq!(warrior.instructions[0].modifier, Modifier::B);
        assert_eq!(warrior.instructions[0].a, Operand::direct(-2));
        assert_eq!(warrior.instructions[0].b, Operand::direct(0));

        // NOP is the only opcode allowed to go bare.
        assert!(parse("NOP").is_ok());
    }

    #[test]
    fn test_case_insensitive_mnemonics() {
        let warrior = parse("mov.i.s #0, 0:1").unwrap();
        let instruction = warrior.instructions[0];
        assert_eq!(instruction.opcode, Opcode::Mov);
        assert_eq!(instruction.stepping, Stepping::S);
        assert_eq!(instruction.b.value, Point::new(0, 1));
    }

    #[test]
    fn test_labels_resolve_to_line_offsets() {
        let source = "
            top   ADD.AB #4, dest
                  JMP    top
            dest  DAT    #0, #0
        ";
        let warrior = parse(source).unwrap();
        assert_eq!(warrior.instructions[0].b.value, Point::new(2, 0));
        assert_eq!(warrior.instructions[1].a.value, Point::new(-1, 0));
    }

    #[test]
    fn test_label_offset_composition() {
        let source = "
            here  JMP here+2
                  NOP
                  DAT #0, #0
        ";
        let warrior = parse(source).unwrap();
        assert_eq!(warrior.instructions[0].a.value, Point::new(2, 0));

        let warrior = parse("here JMP here - 1").unwrap();
        assert_eq!(warrior.instructions[0].a.value, Point::new(-1, 0));
    }

    #[test]
    fn test_label_only_line_and_colon() {
        let source = "
            loop:
                MOV.I $0, $1
                JMP loop
        ";
        let warrior = parse(source).unwrap();
        assert_eq!(warrior.len(), 2);
        assert_eq!(warrior.instructions[1].a.value, Point::new(-1, 0));
    }

    #[test]
    fn test_org_and_end() {
        let warrior = parse("ORG 1\nDAT #0, #0\nMOV.I $0, $1").unwrap();
        assert_eq!(warrior.start, 1);

        let source = "
            ORG 0
            boot DAT #0, #0
            go   MOV.I $0, $1
            END go
        ";
        let warrior = parse(source).unwrap();
        assert_eq!(warrior.start, 1);
    }

    #[test]
    fn test_end_stops_parsing() {
        let warrior = parse("MOV.I $0, $1\nEND\nthis is not redcode").unwrap();
        assert_eq!(warrior.len(), 1);
    }

    #[test]
    fn test_metadata_comments() {
        let source = "
            ;name Dwarf
            ;author A. K. Dewdney
            ;strategy bombs every fourth cell
            ;strategy forever
            DAT #0, #0
        ";
        let warrior = parse(source).unwrap();
        assert_eq!(warrior.name, "Dwarf");
        assert_eq!(warrior.author, "A. K. Dewdney");
        assert_eq!(
            warrior.strategy.as_deref(),
            Some("bombs every fourth cell\nforever")
        );
    }

    #[test]
    fn test_comments_stripped() {
        let source = "
            ; a full-line comment
            MOV.I $0, $1   ; an inline comment

        ";
        assert_eq!(parse(source).unwrap().len(), 1);
    }

    #[test]
    fn test_2d_point_operands() {
        let warrior = parse("MOV.F $1;2, $3:4").unwrap();
        assert_eq!(warrior.instructions[0].a.value, Point::new(1, 2));
        assert_eq!(warrior.instructions[0].b.value, Point::new(3, 4));
    }

    #[test]
    fn test_all_modes_parse() {
        let warrior = parse("MOV.I #1, $2\nMOV.I @3, <4\nMOV.I >5, 6").unwrap();
        let modes: Vec<_> = warrior
            .instructions
            .iter()
            .flat_map(|i| [i.a.mode, i.b.mode])
            .collect();
        assert_eq!(
            modes,
            vec![
                AddressMode::Immediate,
                AddressMode::Direct,
                AddressMode::Indirect,
                AddressMode::PreDecrement,
                AddressMode::PostIncrement,
                AddressMode::Direct,
            ]
        );
    }

    #[test]
    fn test_error_unknown_opcode() {
        assert_eq!(
            parse("MOV.I $0, $1\n123 4, 5"),
            Err(ParseError::UnknownOpcode {
                line: 2,
                mnemonic: "123".to_string()
            })
        );
    }

    #[test]
    fn test_error_unknown_modifier_and_stepping() {
        assert!(matches!(
            parse("MOV.ZZ $0, $1"),
            Err(ParseError::UnknownModifier { line: 1, .. })
        ));
        assert!(matches!(
            parse("MOV.I.X $0, $1"),
            Err(ParseError::UnknownStepping { line: 1, .. })
        ));
    }

    #[test]
    fn test_error_bad_and_missing_operands() {
        assert!(matches!(
            parse("MOV !0, $1"),
            Err(ParseError::BadOperand { line: 1, .. })
        ));
        assert_eq!(
            parse("MOV"),
            Err(ParseError::MissingOperand {
                line: 1,
                opcode: "MOV".to_string()
            })
        );
    }

    #[test]
    fn test_error_overflow() {
        assert!(matches!(
            parse("MOV $99999999999, $1"),
            Err(ParseError::ExpressionOverflow { line: 1, .. })
        ));
    }

    #[test]
    fn test_error_labels() {
        assert!(matches!(
            parse("JMP nowhere"),
            Err(ParseError::UnresolvedLabel { line: 1, .. })
        ));
        assert!(matches!(
            parse("x NOP\nx NOP"),
            Err(ParseError::DuplicateLabel { line: 2, .. })
        ));
    }

    #[test]
    fn test_error_empty_source() {
        assert_eq!(parse("; nothing here\n"), Err(ParseError::EmptyWarrior));
    }

    #[test]
    fn test_canonical_form_roundtrip() {
        let sources = [
            "DAT.F $0, $0",
            "MOV.I $0, $1",
            "MOV.I.S $0, $0:1",
            "ADD.AB #4, $3",
            "SUB.X.Q @-2, <7",
            "DJN.F $-1, >3",
            "SPL.B $0, $0",
            "SLT.A #5, $2:3",
            "SEQ.B.W $1, $1",
            "SNE.AB #0, @0",
            "CMP.I $1, $2",
            "NOP.F $0, $0",
        ];
        for source in sources {
            let warrior = parse(source).unwrap();
            let rendered = warrior.instructions[0].to_string();
            let reparsed = parse(&rendered).unwrap();
            assert_eq!(
                warrior.instructions[0], reparsed.instructions[0],
                "canonical form of '{source}' did not round-trip ('{rendered}')"
            );
        }
    }
}
