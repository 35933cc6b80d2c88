//! Operators that compile resolved tuples into instructions and programs.
//!
//! ```text
//! (function, operand, operand, ...) + store  ── write_instruction ──> Instruction
//! (instruction, instruction, ...) [+ n_lines] ── assemble_program  ──> Program
//! ```
//!
//! Both are pure: the same resolved operands always give the same output.

use crate::error::{Error, Result};
use crate::program::{Instruction, Pointer, Program};
use crate::{Kwargs, Operator, Value};

pub(super) const WRITE_INSTRUCTION: &str = "write_instruction";
pub(super) const ASSEMBLE_PROGRAM: &str = "assemble_program";

pub(super) fn instruction_writer(variable_slots: u8) -> Operator {
    Operator::new(WRITE_INSTRUCTION, move |args, kwargs| write_instruction(args, kwargs, variable_slots))
}

pub(super) fn program_assembler() -> Operator {
    Operator::new(ASSEMBLE_PROGRAM, assemble_program)
}

/// Build one instruction from `(function, operands...)` and the `store` keyword.
///
/// Operand values are immediate pointer tags. The function's arity must match
/// the operand count, and every tag must fall into a slot range.
pub fn write_instruction(args: &[Value], kwargs: &Kwargs, variable_slots: u8) -> Result<Value> {
    let (function, operands) = match args.split_first() {
        Some((Value::Function(function), operands)) => (*function, operands),
        Some((other, _)) => {
            return Err(Error::operator(WRITE_INSTRUCTION, format!("expected a function first, got {}", other.kind())));
        }
        None => return Err(Error::operator(WRITE_INSTRUCTION, "no operands")),
    };

    if operands.len() != function.arity() {
        return Err(Error::Arity { function: function.name().to_string(), expected: function.arity(), found: operands.len() });
    }

    let mut inputs = Vec::with_capacity(operands.len());
    for (idx, operand) in operands.iter().enumerate() {
        let tag = operand
            .as_int()
            .ok_or_else(|| Error::operator(WRITE_INSTRUCTION, format!("operand {idx} is a {}", operand.kind())))?;
        inputs.push(Pointer::checked(tag, variable_slots, &format!("{WRITE_INSTRUCTION} operand {idx}"))?);
    }

    let store = kwargs
        .get("store")
        .and_then(Value::as_int)
        .ok_or_else(|| Error::operator(WRITE_INSTRUCTION, "missing integer `store`"))?;
    let output = Pointer::checked_output(store, variable_slots, &format!("{WRITE_INSTRUCTION} store"))?;

    Ok(Value::Instruction(Instruction::new(function, inputs, output)?))
}

/// Collect instructions into a program, keeping the first `n_lines` when given.
pub fn assemble_program(args: &[Value], kwargs: &Kwargs) -> Result<Value> {
    let mut instructions = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Instruction(instruction) => instructions.push(instruction.clone()),
            other => {
                return Err(Error::operator(ASSEMBLE_PROGRAM, format!("expected instructions, got {}", other.kind())));
            }
        }
    }

    if let Some(n_lines) = kwargs.get("n_lines") {
        let n = n_lines.as_int().ok_or_else(|| Error::operator(ASSEMBLE_PROGRAM, "`n_lines` must be an integer"))?;
        if n < 1 || n as usize > instructions.len() {
            return Err(Error::Domain {
                key: format!("{ASSEMBLE_PROGRAM} n_lines"),
                value: n,
                domain: format!("integers [1, {}]", instructions.len()),
            });
        }
        instructions.truncate(n as usize);
    }

    Ok(Value::Program(Program::new(instructions)))
}
