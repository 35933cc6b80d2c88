//! Node tree construction for [`super::ProgramSpace`].
//!
//! Every reusable piece (function catalogues, pointer kinds, the instruction
//! template) is built once and referenced through `resampled!`, so each use
//! site becomes an independent, separately keyed decision.

use super::compiler::{instruction_writer, program_assembler};
use super::{ArityMask, FIDELITY_NAME, LengthPolicy, PointerKinds, SPACE_NAME, SpaceConfig};
use crate::api::Space;
use crate::error::Result;
use crate::program::{FIRST_VARIABLE_SLOT, Function, PARAMETER_SLOTS};
use crate::{Container, IntegerRange, Node, NodeRef, Operation};

pub(super) fn build(config: &SpaceConfig) -> Result<Space> {
    let variable = Node::integer(
        FIRST_VARIABLE_SLOT as i64,
        FIRST_VARIABLE_SLOT as i64 + config.variable_slots as i64 - 1,
    )?;
    let pointer = pointer_choice(config, &variable)?;
    let signature = signature_choice(config, &pointer)?;

    let instruction = Node::operation(
        Operation::new(instruction_writer(config.variable_slots), resampled!(signature))
            .kwarg("store", resampled!(variable)),
    );

    let max = config.max_program_length;
    let program = match config.policy {
        LengthPolicy::VariableLength => {
            let lengths = (1..=max)
                .map(|n| Node::tuple((0..n).map(|_| resampled!(instruction)).collect()))
                .collect();
            Operation::new(program_assembler(), resampled!(Node::choice(lengths)?))
        }
        LengthPolicy::FixedLength => {
            let lines = Node::tuple((0..max).map(|_| resampled!(instruction)).collect());
            Operation::new(program_assembler(), lines).kwarg("n_lines", Node::integer(1, max as i64)?)
        }
    };

    let mut root = Container::new().with("program", Node::operation(program));
    if config.epoch_fidelity {
        root = root.with(FIDELITY_NAME, Node::fidelity(IntegerRange::new(1, config.max_epochs_per_config)?));
    }
    Ok(Space::new(SPACE_NAME, root))
}

/// `parameter | constant | variable`, restricted to the enabled kinds.
fn pointer_choice(config: &SpaceConfig, variable: &NodeRef) -> Result<NodeRef> {
    let mut kinds = Vec::with_capacity(3);
    if config.pointer_kinds.contains(PointerKinds::PARAMETER) {
        let parameters = PARAMETER_SLOTS.map(|tag| Node::literal(tag as i64)).collect();
        kinds.push(resampled!(Node::choice(parameters)?));
    }
    if config.pointer_kinds.contains(PointerKinds::CONSTANT) {
        let [lo, hi] = config.constants;
        kinds.push(resampled!(Node::integer(lo as i64, hi as i64)?));
    }
    if config.pointer_kinds.contains(PointerKinds::VARIABLE) {
        kinds.push(resampled!(variable));
    }
    Node::choice(kinds)
}

/// One option per enabled arity: `(function, pointer × arity)`.
fn signature_choice(config: &SpaceConfig, pointer: &NodeRef) -> Result<NodeRef> {
    let catalogues: [(ArityMask, Vec<Function>); 3] = [
        (ArityMask::UNARY, config.unary.iter().copied().map(Function::Unary).collect()),
        (ArityMask::BINARY, config.binary.iter().copied().map(Function::Binary).collect()),
        (ArityMask::TERNARY, config.ternary.iter().copied().map(Function::Ternary).collect()),
    ];

    let mut signatures = Vec::with_capacity(catalogues.len());
    for (arity, functions) in catalogues {
        if !config.arities.contains(arity) {
            continue;
        }
        let operands = functions.first().map(|f| f.arity()).unwrap_or_default();
        let function = Node::choice(functions.into_iter().map(Node::literal).collect())?;

        let mut slots = Vec::with_capacity(1 + operands);
        slots.push(resampled!(function));
        slots.extend((0..operands).map(|_| resampled!(pointer)));
        signatures.push(Node::tuple(slots));
    }
    Node::choice(signatures)
}
