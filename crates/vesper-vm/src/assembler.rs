//! Assembly text → [`Program`]
//!
//! ```text
//! .data_start
//!     .export count
//!     .sync owner, linear
//!     count: %Int, null
//!     owner: %String, null
//! .data_end
//! .code_start
//!     .export open
//!     open:
//!         PUSH, count
//!         JUMP, 0xFFFFFFFC
//! .code_end
//! ```

use std::collections::{BTreeMap, HashMap};

use vesper_ast::ValueType;

use crate::{AssembleError, ExternRegistry, Heap, Instruction, Program, ProgramSymbols, SyncMode};

/// Jump target that ends execution
pub const HALT_ADDRESS: u32 = 0xFFFF_FFFC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Start,
    Data,
    BetweenSections,
    Code,
    End,
}

enum JumpTarget {
    Address(u32, usize),
    Label(String, usize),
}

/// Link and verify `text`, which must declare exactly `symbol_count` data
/// symbols and reference only externs present in `externs`
pub fn assemble(
    text: &str,
    symbol_count: usize,
    externs: &ExternRegistry,
) -> Result<Program, AssembleError> {
    let mut section = Section::Start;
    let mut symbols = ProgramSymbols::default();
    let mut types = Vec::new();
    let mut data_exports = Vec::new();
    let mut code_exports = Vec::new();
    let mut sync = BTreeMap::new();
    let mut labels: HashMap<String, u32> = HashMap::new();
    let mut code = Vec::new();
    let mut jumps: Vec<(usize, bool, JumpTarget)> = Vec::new();
    let mut last_line = 0;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        last_line = line;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        match section {
            Section::Start => {
                expect(content, ".data_start", line)?;
                section = Section::Data;
            }
            Section::Data => {
                if content == ".data_end" {
                    section = Section::BetweenSections;
                } else if let Some(name) = content.strip_prefix(".export ") {
                    data_exports.push(name.trim().to_string());
                } else if let Some(rest) = content.strip_prefix(".sync ") {
                    let (name, mode) = rest
                        .split_once(',')
                        .ok_or(AssembleError::MalformedData { line })?;
                    let (name, mode) = (name.trim(), mode.trim());
                    let mode = SyncMode::parse(mode).ok_or_else(|| AssembleError::UnknownSyncMode {
                        name: name.to_string(),
                        mode: mode.to_string(),
                    })?;
                    sync.insert(name.to_string(), mode);
                } else if content.starts_with('.') {
                    return Err(unknown_directive(content, line));
                } else {
                    let (name, ty) = parse_data(content, line)?;
                    if symbols.contains(&name) {
                        return Err(AssembleError::DuplicateSymbol { line, name });
                    }
                    symbols.insert(name);
                    types.push(ty);
                }
            }
            Section::BetweenSections => {
                expect(content, ".code_start", line)?;
                section = Section::Code;
            }
            Section::Code => {
                if content == ".code_end" {
                    section = Section::End;
                } else if let Some(name) = content.strip_prefix(".export ") {
                    code_exports.push(name.trim().to_string());
                } else if content.starts_with('.') {
                    return Err(unknown_directive(content, line));
                } else if let Some(label) = content.strip_suffix(':') {
                    labels.insert(label.trim().to_string(), code.len() as u32);
                } else {
                    let (opcode, operand) = match content.split_once(',') {
                        Some((op, arg)) => (op.trim(), Some(arg.trim())),
                        None => (content, None),
                    };
                    let instruction = match opcode {
                        "NOP" => Instruction::Nop,
                        "POP" => Instruction::Pop,
                        "COPY" => Instruction::Copy,
                        "PUSH" => {
                            let name = require(operand, "PUSH", line)?;
                            let address = symbols.address_of(name).ok_or_else(|| {
                                AssembleError::UnknownSymbol {
                                    line,
                                    name: name.to_string(),
                                }
                            })?;
                            Instruction::Push(address)
                        }
                        "EXTERN" => {
                            let name = require(operand, "EXTERN", line)?.trim_matches('"');
                            if !externs.contains(name) {
                                return Err(AssembleError::UnknownExtern {
                                    line,
                                    name: name.to_string(),
                                });
                            }
                            Instruction::Extern(name.to_string())
                        }
                        "JUMP" | "JUMP_IF_FALSE" => {
                            let target = require(operand, "JUMP", line)?;
                            let target = match parse_address(target) {
                                Some(address) => JumpTarget::Address(address, line),
                                None => JumpTarget::Label(target.to_string(), line),
                            };
                            jumps.push((code.len(), opcode == "JUMP", target));
                            Instruction::Nop
                        }
                        other => {
                            return Err(AssembleError::UnknownOpcode {
                                line,
                                opcode: other.to_string(),
                            })
                        }
                    };
                    code.push(instruction);
                }
            }
            Section::End => return Err(unknown_directive(content, line)),
        }
    }

    let expected = match section {
        Section::Start => Some(".data_start"),
        Section::Data => Some(".data_end"),
        Section::BetweenSections => Some(".code_start"),
        Section::Code => Some(".code_end"),
        Section::End => None,
    };
    if let Some(expected) = expected {
        return Err(AssembleError::MissingSection {
            line: last_line + 1,
            expected,
        });
    }

    if symbols.len() != symbol_count {
        return Err(AssembleError::SymbolCountMismatch {
            declared: symbols.len(),
            expected: symbol_count,
        });
    }

    for (index, unconditional, target) in jumps {
        let address = match target {
            JumpTarget::Address(address, line) => {
                if address != HALT_ADDRESS && address as usize > code.len() {
                    return Err(AssembleError::UnknownLabel {
                        line,
                        name: format!("{:#X}", address),
                    });
                }
                address
            }
            JumpTarget::Label(name, line) => *labels
                .get(&name)
                .ok_or(AssembleError::UnknownLabel { line, name: name.clone() })?,
        };
        code[index] = if unconditional {
            Instruction::Jump(address)
        } else {
            Instruction::JumpIfFalse(address)
        };
    }

    for name in data_exports.iter().chain(sync.keys()) {
        if !symbols.contains(name) {
            return Err(AssembleError::UnknownExport { name: name.clone() });
        }
    }

    let mut entry_points = BTreeMap::new();
    for name in code_exports {
        let address = *labels
            .get(&name)
            .ok_or_else(|| AssembleError::UnknownExport { name: name.clone() })?;
        entry_points.insert(name, address);
    }

    Ok(Program {
        heap: Heap::new(types),
        symbols,
        code,
        exports: data_exports,
        entry_points,
        sync,
    })
}

fn expect(content: &str, directive: &'static str, line: usize) -> Result<(), AssembleError> {
    if content == directive {
        Ok(())
    } else {
        Err(AssembleError::MissingSection {
            line,
            expected: directive,
        })
    }
}

fn unknown_directive(content: &str, line: usize) -> AssembleError {
    AssembleError::UnknownDirective {
        line,
        directive: content.to_string(),
    }
}

fn require<'a>(operand: Option<&'a str>, opcode: &'static str, line: usize) -> Result<&'a str, AssembleError> {
    operand
        .filter(|op| !op.is_empty())
        .ok_or(AssembleError::MissingOperand { line, opcode })
}

/// `name: %Type, null`
fn parse_data(content: &str, line: usize) -> Result<(String, ValueType), AssembleError> {
    let (name, rest) = content
        .split_once(':')
        .ok_or(AssembleError::MalformedData { line })?;
    let (ty, init) = rest
        .split_once(',')
        .ok_or(AssembleError::MalformedData { line })?;
    let ty = ty
        .trim()
        .strip_prefix('%')
        .ok_or(AssembleError::MalformedData { line })?;
    if init.trim() != "null" {
        return Err(AssembleError::MalformedData { line });
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(AssembleError::MalformedData { line });
    }
    let ty = ValueType::from_assembly_name(ty).ok_or_else(|| AssembleError::UnknownType {
        line,
        name: ty.to_string(),
    })?;
    Ok((name.to_string(), ty))
}

fn parse_address(text: &str) -> Option<u32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
