//! Decompiler integration tests.
//!
//! These tests build small programs the way the script compiler lays them out and check
//! the raw expression tree produced by the decompiler, before any optimization:
//! 1. Entry point and function naming
//! 2. Caller-owned slots becoming formal arguments
//! 3. Global promotion through SAVEBP
//! 4. Labels and conditionals
//! 5. Strict and lenient failure handling

use scriptscope::{
    bytecode::{Instruction, InstructionKind, Program, Routine, RoutineTable, Variable, VariableType},
    config::DecompilerConfig,
    decompiler::{Decompiler, GLOBALS_FUNCTION, MAIN_FUNCTION, START_FUNCTION},
    tree::{Expression, ExpressionKind, ExpressionTree, ParameterLocality},
    Error, Result,
};

fn routines() -> RoutineTable {
    RoutineTable::new().with(
        1,
        Routine::new("PrintInteger", VariableType::Void, [VariableType::Int]),
    )
}

fn program(name: &str, instructions: Vec<Instruction>) -> Program {
    let mut program = Program::new(name);
    for instruction in instructions {
        program.add(instruction);
    }
    program
}

fn decompile(program: &Program, config: DecompilerConfig) -> Result<ExpressionTree> {
    Decompiler::new(program, &routines(), config).decompile()
}

fn retn() -> Instruction {
    Instruction::new(InstructionKind::RETN)
}

/// `int StartingConditional() { return 1; }` as compiled: the caller reserves the result
/// slot and main copies its value down into it.
fn starting_conditional() -> Program {
    program(
        "conditional",
        vec![
            Instruction::new(InstructionKind::RSADDI), // 13
            Instruction::jsr(8),                       // 15 -> 23
            retn(),                                    // 21
            Instruction::consti(1),                    // 23
            Instruction::cpdownsp(-8, 4),              // 29
            Instruction::movsp(-4),                    // 37
            retn(),                                    // 43
        ],
    )
}

/// `int g = 7; void main() { PrintInteger(g); }`
fn with_global() -> Program {
    program(
        "globals",
        vec![
            Instruction::jsr(8),                       // 13 -> 21
            retn(),                                    // 19
            Instruction::new(InstructionKind::RSADDI), // 21
            Instruction::consti(7),                    // 23
            Instruction::cpdownsp(-8, 4),              // 29
            Instruction::movsp(-4),                    // 37
            Instruction::new(InstructionKind::SAVEBP), // 43
            Instruction::jsr(16),                      // 45 -> 61
            Instruction::new(InstructionKind::RESTOREBP), // 51
            Instruction::movsp(-4),                    // 53
            retn(),                                    // 59
            Instruction::cptopbp(-4, 4),               // 61
            Instruction::action(1, 1),                 // 69
            retn(),                                    // 74
        ],
    )
}

#[test]
fn test_minimal_program() -> Result<()> {
    let program = program("minimal", vec![Instruction::jsr(8), retn(), retn()]);
    let tree = decompile(&program, DecompilerConfig::strict())?;

    assert_eq!(tree.function_count(), 2);
    let start = tree.function_by_name(START_FUNCTION).unwrap();
    let main = tree.function_by_name(MAIN_FUNCTION).unwrap();
    assert_eq!(tree[start].start, 13);
    assert_eq!(tree[main].start, 21);
    assert_eq!(tree[main].return_type, VariableType::Void);
    assert!(tree[main].arguments.is_empty());

    let root = tree.block(tree[main].block).unwrap();
    assert_eq!(root.expressions.len(), 1);
    assert_eq!(tree.kind(root.expressions[0]), Some(ExpressionKind::Return));

    let entry = tree.block(tree[start].block).unwrap();
    let call = tree[entry.expressions[0]].as_call().unwrap();
    assert_eq!(call.function, main);
    assert!(call.arguments.is_empty());
    Ok(())
}

#[test]
fn test_result_slot_becomes_pointer_argument() -> Result<()> {
    let tree = decompile(&starting_conditional(), DecompilerConfig::strict())?;
    let main = tree.function_by_name(MAIN_FUNCTION).unwrap();

    let arguments = &tree[main].arguments;
    assert_eq!(arguments.len(), 1);
    assert_eq!(arguments[0].stack_offset, -4);
    assert_eq!(arguments[0].variable_type, VariableType::Int);
    assert!(arguments[0].pointer);

    // int var = 1; arg_0 = var; return;
    let root = tree.block(tree[main].block).unwrap();
    assert_eq!(root.expressions.len(), 3);
    let copy = tree.binary(root.expressions[1]).unwrap();
    assert_eq!(copy.left, arguments[0].param);
    assert!(!copy.declare_left);

    // The caller passes its reserved slot.
    let start = tree.function_by_name(START_FUNCTION).unwrap();
    let entry = tree.block(tree[start].block).unwrap();
    let reserved = entry.expressions[0];
    let call = tree[entry.expressions[1]].as_call().unwrap();
    assert_eq!(call.arguments, vec![reserved]);
    Ok(())
}

#[test]
fn test_saved_base_pointer_promotes_globals() -> Result<()> {
    let tree = decompile(&with_global(), DecompilerConfig::strict())?;

    assert_eq!(tree.function_count(), 3);
    let globals = tree.function_by_name(GLOBALS_FUNCTION).unwrap();
    assert!(tree.function_by_name(MAIN_FUNCTION).is_some());

    assert_eq!(tree.globals().len(), 1);
    let global = &tree.globals()[0];
    assert!(global.value.is_none());
    assert_eq!(
        tree.parameter(global.param).unwrap().locality,
        ParameterLocality::Global
    );

    // Bare global declarations are not part of the initializer body.
    let body = tree.block(tree[globals].block).unwrap();
    assert!(body.expressions.iter().all(|&s| !tree.is_parameter(s)));
    let store = body
        .expressions
        .iter()
        .filter_map(|&s| tree.binary(s))
        .find(|b| b.left == global.param)
        .unwrap();
    assert_eq!(tree.kind(store.right), Some(ExpressionKind::Parameter));
    Ok(())
}

#[test]
fn test_callee_reads_become_value_arguments() -> Result<()> {
    let program = program(
        "helper",
        vec![
            Instruction::jsr(8),         // 13 -> 21
            retn(),                      // 19
            Instruction::consti(4),      // 21
            Instruction::jsr(14),        // 27 -> 41
            Instruction::movsp(-4),      // 33
            retn(),                      // 39
            Instruction::cptopsp(-4, 4), // 41
            Instruction::action(1, 1),   // 49
            retn(),                      // 54
        ],
    );
    let tree = decompile(&program, DecompilerConfig::strict())?;

    assert_eq!(tree.function_count(), 3);
    let helper = tree.function_ids()[2];
    assert_eq!(tree[helper].start, 41);
    assert_eq!(tree[helper].display_name(), "fun_00000029");

    let arguments = &tree[helper].arguments;
    assert_eq!(arguments.len(), 1);
    assert_eq!(arguments[0].stack_offset, -4);
    assert!(!arguments[0].pointer);
    assert_eq!(arguments[0].number(), 0);
    Ok(())
}

#[test]
fn test_loop_gets_label_and_conditional_exit() -> Result<()> {
    let program = program(
        "loop",
        vec![
            Instruction::jsr(8),                             // 13 -> 21
            retn(),                                          // 19
            Instruction::consti(0),                          // 21
            Instruction::cptopsp(-4, 4),                     // 27
            Instruction::consti(3),                          // 35
            Instruction::new(InstructionKind::LTII),         // 41
            Instruction::jz(18),                             // 43 -> 61
            Instruction::step(InstructionKind::INCISP, -4),  // 49
            Instruction::jmp(-28),                           // 55 -> 27
            Instruction::movsp(-4),                          // 61
            retn(),                                          // 67
        ],
    );
    let tree = decompile(&program, DecompilerConfig::strict())?;
    let main = tree.function_by_name(MAIN_FUNCTION).unwrap();
    let root = tree.block(tree[main].block).unwrap();

    let kinds: Vec<_> = root.expressions.iter().filter_map(|&s| tree.kind(s)).collect();
    assert_eq!(
        kinds,
        vec![
            ExpressionKind::Assign,
            ExpressionKind::Label,
            ExpressionKind::Assign,
            ExpressionKind::Assign,
            ExpressionKind::Assign,
            ExpressionKind::Conditional,
            ExpressionKind::Increment,
            ExpressionKind::Goto,
        ]
    );

    let label = root.expressions[1];
    assert_eq!(tree[label].offset(), 27);
    assert_eq!(tree[root.expressions[7]].as_goto().unwrap().label, label);

    let conditional = tree[root.expressions[5]].as_conditional().unwrap();
    let test = tree.binary(conditional.test).unwrap();
    assert_eq!(test.kind, ExpressionKind::Equal);
    assert_eq!(
        tree[test.right].as_constant().map(|c| c.value.clone()),
        Some(Variable::Int(0))
    );
    let exit = tree.block(conditional.if_true).unwrap();
    assert_eq!(tree[exit.expressions[0]].offset(), 67);
    assert_eq!(tree[main].end, 67);
    Ok(())
}

#[test]
fn test_lenient_and_strict_failures() {
    // ADDII on an empty stack
    let program = program(
        "broken",
        vec![
            Instruction::jsr(8),                      // 13 -> 21
            retn(),                                   // 19
            Instruction::new(InstructionKind::ADDII), // 21
            retn(),                                   // 23
        ],
    );

    let tree = decompile(&program, DecompilerConfig::lenient()).unwrap();
    assert!(tree.diagnostics().has_errors());
    let diagnostic = tree.diagnostics().for_function(21).next().unwrap();
    assert_eq!(diagnostic.block, 21);
    assert!(diagnostic.message.contains("operand stack underflow"));
    assert!(tree.function_by_name(MAIN_FUNCTION).is_some());

    let err = decompile(&program, DecompilerConfig::strict()).unwrap_err();
    let Error::Block {
        function,
        block,
        source,
    } = err
    else {
        panic!("expected a block error, got {err:?}");
    };
    assert_eq!((function, block), (21, 21));
    assert!(matches!(
        *source,
        Error::Validation {
            kind: InstructionKind::ADDII,
            ..
        }
    ));
}

#[test]
fn test_conditional_early_return() -> Result<()> {
    let program = program(
        "branch",
        vec![
            Instruction::jsr(8),       // 13 -> 21
            retn(),                    // 19
            Instruction::consti(1),    // 21
            Instruction::jz(17),       // 27 -> 44
            Instruction::consti(2),    // 33
            Instruction::action(1, 1), // 39
            retn(),                    // 44
        ],
    );
    let tree = decompile(&program, DecompilerConfig::strict())?;
    let main = tree.function_by_name(MAIN_FUNCTION).unwrap();
    let root = tree.block(tree[main].block).unwrap();

    let conditionals: Vec<_> = root
        .expressions
        .iter()
        .filter_map(|&s| tree[s].as_conditional())
        .collect();
    assert_eq!(conditionals.len(), 1);

    let test = tree.binary(conditionals[0].test).unwrap();
    assert!(matches!(test.kind, ExpressionKind::Equal | ExpressionKind::NotEqual));
    assert_eq!(
        tree[test.right].as_constant().map(|c| c.value.clone()),
        Some(Variable::Int(0))
    );

    let taken = tree.block(conditionals[0].if_true).unwrap();
    assert_eq!(taken.expressions.len(), 1);
    assert_eq!(tree.kind(taken.expressions[0]), Some(ExpressionKind::Return));
    Ok(())
}

#[test]
fn test_backward_conditional_jump_loops_to_label() -> Result<()> {
    let program = program(
        "do_while",
        vec![
            Instruction::jsr(8),                            // 13 -> 21
            retn(),                                         // 19
            Instruction::consti(0),                         // 21
            Instruction::step(InstructionKind::INCISP, -4), // 27
            Instruction::cptopsp(-4, 4),                    // 33
            Instruction::consti(3),                         // 41
            Instruction::new(InstructionKind::LTII),        // 47
            Instruction::jnz(-22),                          // 49 -> 27
            Instruction::movsp(-4),                         // 55
            retn(),                                         // 61
        ],
    );
    let tree = decompile(&program, DecompilerConfig::strict())?;
    let main = tree.function_by_name(MAIN_FUNCTION).unwrap();
    let root = tree.block(tree[main].block).unwrap();

    let labels: Vec<_> = root
        .expressions
        .iter()
        .copied()
        .filter(|&s| tree.kind(s) == Some(ExpressionKind::Label))
        .collect();
    assert_eq!(labels.len(), 1);
    assert_eq!(tree[labels[0]].offset(), 27);

    let counter = tree.binary(root.expressions[0]).unwrap().left;
    let increment = root
        .expressions
        .iter()
        .find_map(|&s| match &tree[s] {
            Expression::Unary(unary) if unary.kind == ExpressionKind::Increment => Some(unary),
            _ => None,
        })
        .unwrap();
    assert_eq!(increment.operand, counter);

    let conditional = root
        .expressions
        .iter()
        .find_map(|&s| tree[s].as_conditional())
        .unwrap();
    assert_eq!(
        tree.binary(conditional.test).map(|b| b.kind),
        Some(ExpressionKind::NotEqual)
    );
    let taken = tree.block(conditional.if_true).unwrap();
    assert_eq!(taken.expressions.len(), 1);
    assert_eq!(tree[taken.expressions[0]].as_goto().unwrap().label, labels[0]);
    Ok(())
}
