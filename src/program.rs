//! Register-machine program representation.
//!
//! A compiled program is an ordered list of instructions. Each instruction
//! applies a fixed-arity function to pointers into three disjoint slot ranges
//! and writes into a variable slot:
//!
//! ```text
//! 0 ..= 2          parameters
//! 3 ..= 8          constants
//! 9 .. 9 + S       variables (S = available variable slots)
//! ```
//!
//! Later instructions may read variables written by earlier ones, so order is
//! significant. Pruning unread outputs happens downstream, not here.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PARAMETER_SLOTS: std::ops::RangeInclusive<u8> = 0..=2;
pub const CONSTANT_SLOTS: std::ops::RangeInclusive<u8> = 3..=8;
pub const FIRST_VARIABLE_SLOT: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Parameter,
    Constant,
    Variable,
}

impl PointerKind {
    /// Classify `tag` given `variable_slots` available variables.
    pub fn classify(tag: u8, variable_slots: u8) -> Option<PointerKind> {
        if PARAMETER_SLOTS.contains(&tag) {
            Some(PointerKind::Parameter)
        } else if CONSTANT_SLOTS.contains(&tag) {
            Some(PointerKind::Constant)
        } else if (tag as u16) < FIRST_VARIABLE_SLOT as u16 + variable_slots as u16 {
            Some(PointerKind::Variable)
        } else {
            None
        }
    }

    fn prefix(self) -> char {
        match self {
            PointerKind::Parameter => 'p',
            PointerKind::Constant => 'c',
            PointerKind::Variable => 'v',
        }
    }
}

/// Tagged reference into the program's addressing space. Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pointer(pub u8);

impl Pointer {
    pub fn tag(self) -> u8 {
        self.0
    }

    /// Build a pointer, rejecting tags outside all three slot ranges.
    pub fn checked(tag: i64, variable_slots: u8, key: &str) -> Result<Pointer> {
        let domain = || format!("pointer slots [0, {})", FIRST_VARIABLE_SLOT as u16 + variable_slots as u16);
        let tag = u8::try_from(tag).map_err(|_| Error::Domain { key: key.to_string(), value: tag, domain: domain() })?;
        match PointerKind::classify(tag, variable_slots) {
            Some(_) => Ok(Pointer(tag)),
            None => Err(Error::Domain { key: key.to_string(), value: tag as i64, domain: domain() }),
        }
    }

    /// Build an output pointer: only variable slots are writable.
    pub fn checked_output(tag: i64, variable_slots: u8, key: &str) -> Result<Pointer> {
        let pointer = Pointer::checked(tag, variable_slots, key)?;
        match PointerKind::classify(pointer.0, variable_slots) {
            Some(PointerKind::Variable) => Ok(pointer),
            _ => Err(Error::Domain {
                key: key.to_string(),
                value: tag,
                domain: format!("variable slots [{}, {})", FIRST_VARIABLE_SLOT, FIRST_VARIABLE_SLOT as u16 + variable_slots as u16),
            }),
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display assumes the widest variable range; anything past constants is a variable.
        let kind = PointerKind::classify(self.0, u8::MAX - FIRST_VARIABLE_SLOT).unwrap_or(PointerKind::Variable);
        write!(f, "{}{}", kind.prefix(), self.0)
    }
}

macro_rules! op_catalogue {
    ($name:ident, $arity:expr, [ $($variant:ident => $label:literal),+ $(,)? ]) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Catalogue in choice-index order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const ARITY: usize = $arity;

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }
    };
}

op_catalogue!(UnaryOp, 1, [
    Square => "square",
    Exp => "exp",
    Log => "log",
    Sign => "sign",
    Sqrt => "sqrt",
    Abs => "abs",
    Norm => "norm",
    Sin => "sin",
    Cos => "cos",
    Tan => "tan",
    Asin => "asin",
    Acos => "acos",
    Atan => "atan",
    Mean => "mean",
    Std => "std",
    Size => "size",
]);

op_catalogue!(BinaryOp, 2, [
    Clip => "clip",
    Div => "div",
    Mul => "mul",
    Add => "add",
    Sub => "sub",
    Minimum => "minimum",
    Maximum => "maximum",
    Heaviside => "heaviside",
]);

op_catalogue!(TernaryOp, 3, [
    Interpolate => "interpolate",
    BiasCorrect => "bias_correct",
]);

/// A function with a fixed input arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Ternary(TernaryOp),
}

impl Function {
    pub fn arity(self) -> usize {
        match self {
            Function::Unary(_) => UnaryOp::ARITY,
            Function::Binary(_) => BinaryOp::ARITY,
            Function::Ternary(_) => TernaryOp::ARITY,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Unary(op) => op.name(),
            Function::Binary(op) => op.name(),
            Function::Ternary(op) => op.name(),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub function: Function,
    pub inputs: Vec<Pointer>,
    pub output: Pointer,
}

impl Instruction {
    /// Build an instruction, enforcing `inputs.len() == function.arity()`.
    pub fn new(function: Function, inputs: Vec<Pointer>, output: Pointer) -> Result<Self> {
        if inputs.len() != function.arity() {
            return Err(Error::Arity {
                function: function.name().to_string(),
                expected: function.arity(),
                found: inputs.len(),
            });
        }
        Ok(Instruction { function, inputs, output })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}(", self.output, self.function)?;
        for (idx, input) in self.inputs.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{input}")?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Program { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, instruction) in self.instructions.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{instruction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_respects_slot_boundaries() {
        assert_eq!(PointerKind::classify(0, 11), Some(PointerKind::Parameter));
        assert_eq!(PointerKind::classify(2, 11), Some(PointerKind::Parameter));
        assert_eq!(PointerKind::classify(3, 11), Some(PointerKind::Constant));
        assert_eq!(PointerKind::classify(8, 11), Some(PointerKind::Constant));
        assert_eq!(PointerKind::classify(9, 11), Some(PointerKind::Variable));
        assert_eq!(PointerKind::classify(19, 11), Some(PointerKind::Variable));
        assert_eq!(PointerKind::classify(20, 11), None);
        assert_eq!(PointerKind::classify(9, 0), None);
    }

    #[test]
    fn output_pointer_must_be_variable() {
        assert!(Pointer::checked_output(9, 1, "k").is_ok());
        assert!(matches!(Pointer::checked_output(4, 1, "k"), Err(Error::Domain { value: 4, .. })));
        assert!(matches!(Pointer::checked(-1, 1, "k"), Err(Error::Domain { value: -1, .. })));
        assert!(matches!(Pointer::checked(10, 1, "k"), Err(Error::Domain { value: 10, .. })));
    }

    #[test]
    fn instruction_rejects_wrong_operand_count() {
        let err = Instruction::new(Function::Unary(UnaryOp::Sqrt), vec![Pointer(1), Pointer(2)], Pointer(9))
            .unwrap_err();
        assert!(matches!(err, Error::Arity { expected: 1, found: 2, .. }));

        let ok = Instruction::new(Function::Ternary(TernaryOp::Interpolate), vec![Pointer(9), Pointer(1), Pointer(10)], Pointer(12));
        assert!(ok.is_ok());
    }

    #[test]
    fn catalogues_keep_choice_order() {
        assert_eq!(UnaryOp::ALL.len(), 16);
        assert_eq!(BinaryOp::ALL.len(), 8);
        assert_eq!(TernaryOp::ALL.len(), 2);
        assert_eq!(UnaryOp::ALL[4], UnaryOp::Sqrt);
        assert_eq!(BinaryOp::ALL[3], BinaryOp::Add);
        assert_eq!(TernaryOp::ALL[1], TernaryOp::BiasCorrect);
    }

    #[test]
    fn program_renders_as_listing() {
        let program = Program::new(vec![
            Instruction::new(Function::Unary(UnaryOp::Square), vec![Pointer(1)], Pointer(11)).unwrap(),
            Instruction::new(Function::Binary(BinaryOp::Sub), vec![Pointer(3), Pointer(5)], Pointer(9)).unwrap(),
        ]);
        assert_eq!(program.to_string(), "v11 = square(p1)\nv9 = sub(c3, c5)");
    }
}
