use super::compiler::instruction_writer;
use super::*;
use crate::program::{Function, Instruction, Pointer, PointerKind};
use crate::{Container, Node, Operation, RandomSampler, Space};

const ADAMW: &str = include_str!("../../../fixtures/adamw.json");
const ADAMW_HEAD_YAML: &str = include_str!("../../../fixtures/adamw_head.yaml");

const ADAMW_LAST_STORE: &str =
    "space.program.args.resampled_choice.chosen[13].resampled_operation.kwargs{store}.resampled_integer::integer__9_19_false";

const FIXED_N_LINES: &str = "space.program.kwargs{n_lines}::integer__1_20_false";

fn instruction(function: Function, inputs: &[u8], output: u8) -> Instruction {
    Instruction::new(function, inputs.iter().copied().map(Pointer).collect(), Pointer(output)).unwrap()
}

fn adamw() -> Program {
    use BinaryOp::{Add, Div, Mul, Sub};
    use Function::{Binary, Ternary, Unary};
    use TernaryOp::{BiasCorrect, Interpolate};

    Program::new(vec![
        instruction(Unary(UnaryOp::Square), &[1], 11),
        instruction(Binary(Sub), &[3, 5], 9),
        instruction(Binary(Sub), &[3, 7], 10),
        instruction(Ternary(Interpolate), &[12, 1, 9], 12),
        instruction(Ternary(Interpolate), &[13, 11, 10], 13),
        instruction(Ternary(BiasCorrect), &[12, 9, 2], 14),
        instruction(Ternary(BiasCorrect), &[13, 10, 2], 15),
        instruction(Binary(Mul), &[6, 8], 16),
        instruction(Unary(UnaryOp::Sqrt), &[15], 17),
        instruction(Binary(Add), &[17, 16], 17),
        instruction(Binary(Div), &[14, 17], 19),
        instruction(Binary(Mul), &[0, 6], 18),
        instruction(Binary(Add), &[19, 18], 19),
        instruction(Binary(Mul), &[19, 7], 19),
    ])
}

fn default_space() -> ProgramSpace {
    ProgramSpace::new(SpaceConfig::default()).unwrap()
}

fn fixed_space() -> ProgramSpace {
    ProgramSpace::new(SpaceConfig { policy: LengthPolicy::FixedLength, ..SpaceConfig::default() }).unwrap()
}

fn assert_well_formed(program: &Program, config: &SpaceConfig) {
    assert!((1..=config.max_program_length).contains(&program.len()), "length {}", program.len());
    for instruction in &program.instructions {
        assert_eq!(instruction.inputs.len(), instruction.function.arity(), "{instruction}");
        for input in &instruction.inputs {
            assert!(PointerKind::classify(input.tag(), config.variable_slots).is_some(), "{instruction}");
        }
        assert_eq!(PointerKind::classify(instruction.output.tag(), config.variable_slots), Some(PointerKind::Variable));
    }
}

#[test]
fn same_seed_same_program() {
    let space = default_space();
    let a = space.sample(2024).unwrap();
    let b = space.sample(2024).unwrap();
    assert_eq!(a.program, b.program);
    assert_eq!(a.trace, b.trace);
    assert_eq!(a.epochs, b.epochs);
}

#[test]
fn sampled_programs_respect_arity_and_slots() {
    for policy in [LengthPolicy::VariableLength, LengthPolicy::FixedLength] {
        let space = ProgramSpace::new(SpaceConfig { policy, ..SpaceConfig::default() }).unwrap();
        for seed in 0..200 {
            let out = space.sample(seed).unwrap();
            assert_well_formed(&out.program, space.config());
            let epochs = out.epochs.unwrap();
            assert!((1..=20).contains(&epochs));
        }
    }
}

#[test]
fn recorded_trace_replays_exactly() {
    let space = default_space();
    let first = space.sample(77).unwrap();

    let json = space.record(&first.trace).to_json().unwrap();
    let record = TraceRecord::from_json(&json).unwrap();
    assert_eq!(record.policy.as_deref(), Some("variable_length"));

    let again = space.replay(&record).unwrap();
    assert_eq!(again.program, first.program);
    assert_eq!(again.epochs, first.epochs);
    assert_eq!(again.metrics.sampled, 0);
    assert_eq!(again.trace, first.trace);
}

#[test]
fn variable_slot_keys_use_half_open_range() {
    let out = default_space().sample(3).unwrap();
    let stores: Vec<&String> = out.trace.samplings.keys().filter(|key| key.contains("kwargs{store}")).collect();
    assert_eq!(stores.len(), out.program.len());
    assert!(stores.iter().all(|key| key.ends_with("::integer__9_19_false")));
}

#[test]
fn pinned_length_and_first_function_fill_in_the_rest() {
    let space = default_space();
    let first = "space.program.args.resampled_choice.chosen[0].resampled_operation.args.resampled_choice";
    let table = OverrideTable::new()
        .with_sampling("space.program.args.resampled_choice::choice__20", 4)
        .with_sampling(format!("{first}::choice__3"), 0)
        .with_sampling(format!("{first}.chosen[0].resampled_choice::choice__16"), 4);

    let mut programs = Vec::new();
    for seed in 0..20 {
        let out = space.replay_table(&table, seed).unwrap();
        assert_eq!(out.program.len(), 5);
        assert_eq!(out.program.instructions[0].function, Function::Unary(UnaryOp::Sqrt));
        assert_eq!(out.metrics.overridden, 3);
        assert_well_formed(&out.program, space.config());
        programs.push(out.program);
    }

    programs.sort_by_key(|program| program.to_string());
    programs.dedup();
    assert!(programs.len() > 1, "free decisions never varied across seeds");
}

#[test]
fn adamw_table_resolves_to_reference_program() {
    let space = default_space();
    let record = TraceRecord::from_json(ADAMW).unwrap();

    let out = space.replay(&record).unwrap();

    assert_eq!(out.program, adamw());
    assert_eq!(out.epochs, Some(20));
    assert_eq!(out.metrics.sampled, 0);
    assert_eq!(out.metrics.overridden, record.samplings.len() + 1);
}

#[test]
fn adamw_single_edit_changes_only_that_decision() {
    let space = default_space();
    let mut record = TraceRecord::from_json(ADAMW).unwrap();
    record.samplings.insert(ADAMW_LAST_STORE.to_string(), 18);
    record.environment.insert("epochs".to_string(), 5);

    let out = space.replay(&record).unwrap();

    let mut expected = adamw();
    expected.instructions[13].output = Pointer(18);
    assert_eq!(out.program, expected);
    assert_eq!(out.epochs, Some(5));
}

#[test]
fn adamw_out_of_range_slot_is_rejected() {
    let space = default_space();
    let mut record = TraceRecord::from_json(ADAMW).unwrap();
    let store = "space.program.args.resampled_choice.chosen[0].resampled_operation.kwargs{store}.resampled_integer::integer__9_19_false";
    record.samplings.insert(store.to_string(), 20);

    assert!(matches!(space.replay(&record), Err(Error::Domain { value: 20, .. })));
}

#[test]
fn exact_replay_fails_on_a_missing_decision() {
    let space = default_space();
    let mut record = TraceRecord::from_json(ADAMW).unwrap();
    record.samplings.shift_remove(ADAMW_LAST_STORE);

    match space.replay(&record) {
        Err(Error::MissingOverride { key }) => assert_eq!(key, ADAMW_LAST_STORE),
        other => panic!("expected a missing override, got {other:?}"),
    }

    let partial = space.replay_partial(&record, 5).unwrap();
    assert_eq!(partial.program.instructions[..13], adamw().instructions[..13]);
    assert_eq!(partial.metrics.sampled, 1);
}

#[test]
fn exact_replay_fails_on_a_missing_fidelity() {
    let space = default_space();
    let mut record = TraceRecord::from_json(ADAMW).unwrap();
    record.environment.clear();

    assert!(matches!(space.replay(&record), Err(Error::MissingOverride { ref key }) if key == "ENVIRONMENT__epochs"));
}

#[test]
fn flat_yaml_config_replays_exactly() {
    let space = default_space();
    let record = TraceRecord::from_yaml(ADAMW_HEAD_YAML).unwrap();
    assert_eq!(record.policy, None);

    let out = space.replay(&record).unwrap();

    assert_eq!(out.program.instructions, adamw().instructions[..2]);
    assert_eq!(out.epochs, Some(7));
    assert_eq!(out.metrics.sampled, 0);
}

#[test]
fn fixed_policy_truncation_keeps_a_prefix() {
    let space = fixed_space();
    let sampled = space.sample(31).unwrap();
    assert!(sampled.trace.get(FIXED_N_LINES).is_some());
    assert_eq!(sampled.trace.get(FIXED_N_LINES), Some(sampled.program.len() as i64));

    let full_table = sampled.trace.to_overrides().with_sampling(FIXED_N_LINES, 20);
    let full = space.replay_table(&full_table, 0).unwrap().program;
    assert_eq!(full.len(), 20);

    for n in 1..=20 {
        let table = sampled.trace.to_overrides().with_sampling(FIXED_N_LINES, n);
        let out = space.replay_table(&table, 0).unwrap();
        assert_eq!(out.program.instructions, full.instructions[..n as usize]);
    }
}

#[test]
fn fixed_policy_records_every_instruction_draw() {
    let space = fixed_space();
    let out = space.sample(8).unwrap();
    let stores = out.trace.samplings.keys().filter(|key| key.contains("kwargs{store}")).count();
    assert_eq!(stores, 20);
    assert!(out.trace.samplings.keys().all(|key| !key.starts_with(LengthPolicy::VariableLength.key_prefix())));
}

#[test]
fn degenerate_space_has_one_program() {
    let config = SpaceConfig {
        max_program_length: 1,
        variable_slots: 1,
        constants: [3, 3],
        epoch_fidelity: false,
        arities: ArityMask::UNARY,
        pointer_kinds: PointerKinds::CONSTANT,
        unary: vec![UnaryOp::Exp],
        ..SpaceConfig::default()
    };
    let space = ProgramSpace::new(config).unwrap();

    for seed in 0..25 {
        let out = space.sample(seed).unwrap();
        assert_eq!(out.program.to_string(), "v9 = exp(c3)");
        assert_eq!(out.epochs, None);
        assert!(out.trace.environment.is_empty());
    }
}

#[test]
fn foreign_policy_record_is_refused() {
    let fixed = fixed_space();
    let record = fixed.record(&fixed.sample(4).unwrap().trace);

    let err = default_space().replay(&record).unwrap_err();
    assert!(matches!(
        err,
        Error::StructuralPolicyMismatch { ref expected, ref found } if expected == "variable_length" && found == "fixed_length"
    ));
}

#[test]
fn foreign_policy_keys_are_detected_without_metadata() {
    let variable = default_space();
    let trace = variable.sample(4).unwrap().trace;

    let err = fixed_space().replay_table(&trace.to_overrides(), 0).unwrap_err();
    assert!(matches!(err, Error::StructuralPolicyMismatch { .. }), "{err:?}");

    let untagged = TraceRecord { policy: None, ..variable.record(&trace) };
    let err = fixed_space().replay(&untagged).unwrap_err();
    assert!(matches!(err, Error::StructuralPolicyMismatch { .. }), "{err:?}");
}

#[test]
fn stale_keys_stay_key_mismatch() {
    let table = OverrideTable::new().with_sampling("space.optimizer::choice__4", 1);
    let err = default_space().replay_table(&table, 0).unwrap_err();
    assert!(matches!(err, Error::KeyMismatch { ref keys } if keys.len() == 1));
}

#[test]
fn invalid_configs_are_rejected() {
    let cases = [
        SpaceConfig { max_program_length: 0, ..SpaceConfig::default() },
        SpaceConfig { max_program_length: 65, ..SpaceConfig::default() },
        SpaceConfig { max_epochs_per_config: 0, ..SpaceConfig::default() },
        SpaceConfig { variable_slots: 0, ..SpaceConfig::default() },
        SpaceConfig { variable_slots: 248, ..SpaceConfig::default() },
        SpaceConfig { constants: [5, 4], ..SpaceConfig::default() },
        SpaceConfig { constants: [2, 8], ..SpaceConfig::default() },
        SpaceConfig { arities: ArityMask::empty(), ..SpaceConfig::default() },
        SpaceConfig { pointer_kinds: PointerKinds::empty(), ..SpaceConfig::default() },
        SpaceConfig { ternary: Vec::new(), ..SpaceConfig::default() },
    ];
    for config in cases {
        assert!(matches!(ProgramSpace::new(config.clone()), Err(Error::InvalidConfig(_))), "{config:?}");
    }

    let unused_catalogue = SpaceConfig { arities: ArityMask::UNARY, ternary: Vec::new(), ..SpaceConfig::default() };
    assert!(ProgramSpace::new(unused_catalogue).is_ok());
}

#[test]
fn config_loads_from_partial_json() {
    let config = SpaceConfig::from_json(r#"{"max_program_length": 5, "policy": "fixed_length", "epoch_fidelity": false}"#)
        .unwrap();
    assert_eq!(config.max_program_length, 5);
    assert_eq!(config.policy, LengthPolicy::FixedLength);
    assert_eq!(config.variable_slots, DEFAULT_VARIABLE_SLOTS);
    assert_eq!(config.unary.len(), 16);

    assert!(matches!(SpaceConfig::from_json(r#"{"max_program_length": 0}"#), Err(Error::InvalidConfig(_))));
    assert!(matches!(SpaceConfig::from_json("{"), Err(Error::Json(_))));
}

#[test]
fn shared_space_resolves_concurrently() {
    let space = default_space();
    let sequential: Vec<Program> = (0..16).map(|seed| space.sample(seed).unwrap().program).collect();

    let concurrent: Vec<Program> = std::thread::scope(|scope| {
        let space = &space;
        let handles: Vec<_> =
            (0..16).map(|seed| scope.spawn(move || space.sample(seed).unwrap().program)).collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(sequential, concurrent);
}

#[test]
fn mismatched_operand_count_is_an_arity_error() {
    let store = Node::integer(9, 9).unwrap();
    let args = tuple![Node::literal(Function::Unary(UnaryOp::Abs)), Node::literal(1), Node::literal(2)];
    let op = Node::operation(Operation::new(instruction_writer(1), args).kwarg("store", store));
    let space = Space::new("broken", Container::new().with("instruction", op));

    let err = crate::resolve(&space, &mut RandomSampler::seeded(0)).unwrap_err();
    assert!(matches!(err, Error::Arity { expected: 1, found: 2, .. }));
}
