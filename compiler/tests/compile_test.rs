use clap::Parser as _;
use pl0_lang::cli::{Cli, CliHandler};
use pl0_lang::object::{read_object_file, ObjectFormat};
use pl0_lang::{compile, CompileError, CompilerConfig, ControlFlow};
use std::fs;
use tempfile::tempdir;

const COUNTER: &str = "var i; begin i := 0; while i < 3 do i := i + 1 end.";

fn triples(source: &str, config: &CompilerConfig) -> Vec<(u8, u16, i32)> {
    compile(source, config)
        .unwrap()
        .program
        .iter()
        .map(|i| (u8::from(i.opcode), i.level, i.modifier))
        .collect()
}

#[test]
fn test_constant_plus_one_then_write() {
    let source = "const a = 5; var b; b := a + 1; write b.";
    assert_eq!(
        triples(source, &CompilerConfig::default()),
        vec![
            (6, 0, 5),
            (1, 0, 5),
            (1, 0, 1),
            (2, 0, 2),
            (4, 0, 4),
            (3, 0, 4),
            (9, 0, 0),
            (9, 0, 2),
        ]
    );
}

#[test]
fn test_while_loop_jumps_back_and_exits_past_body() {
    assert_eq!(
        triples(COUNTER, &CompilerConfig::default()),
        vec![
            (6, 0, 5),
            (1, 0, 0),
            (4, 0, 4),
            (3, 0, 4),
            (1, 0, 3),
            (2, 0, 10),
            (8, 0, 12),
            (3, 0, 4),
            (1, 0, 1),
            (2, 0, 2),
            (4, 0, 4),
            (7, 0, 3),
            (9, 0, 2),
        ]
    );
}

#[test]
fn test_unguarded_loop_has_no_jumps() {
    let config = CompilerConfig::new().with_control_flow(ControlFlow::Unguarded);
    let ops: Vec<u8> = triples(COUNTER, &config).into_iter().map(|t| t.0).collect();
    assert!(!ops.contains(&7));
    assert!(!ops.contains(&8));
}

#[test]
fn test_symbols_are_reported() {
    let compilation = compile("const k = 2; var x, y; x := k.", &CompilerConfig::default()).unwrap();
    let names: Vec<String> = compilation.symbols.iter().map(|s| s.name.clone()).collect();
    assert_eq!(names, vec!["k", "x", "y"]);
}

#[test]
fn test_first_error_aborts() {
    let error = compile("var x; x := y; z := 1.", &CompilerConfig::default()).unwrap_err();
    assert!(matches!(
        error,
        CompileError::UndeclaredIdentifier { ref name, .. } if name == "y"
    ));
    assert_eq!(error.index(), 6);
}

#[test]
fn test_cli_compile_then_read_back() {
    let temp_dir = tempdir().unwrap();
    let input = temp_dir.path().join("counter.pl0");
    let output = temp_dir.path().join("counter.bin");
    fs::write(&input, COUNTER).unwrap();

    let cli = Cli::try_parse_from([
        "pl0c",
        "compile",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--format",
        "binary",
    ])
    .unwrap();
    CliHandler::new().handle(cli).unwrap();

    let program = read_object_file(&output, ObjectFormat::Binary).unwrap();
    assert_eq!(program, compile(COUNTER, &CompilerConfig::default()).unwrap().program);
}

#[test]
fn test_cli_default_output_is_text() {
    let temp_dir = tempdir().unwrap();
    let input = temp_dir.path().join("sum.pl0");
    fs::write(&input, "const a = 5; var b; b := a + 1; write b.").unwrap();

    let cli = Cli::try_parse_from(["pl0c", "compile", input.to_str().unwrap()]).unwrap();
    CliHandler::new().handle(cli).unwrap();

    let text = fs::read_to_string(temp_dir.path().join("sum.obj")).unwrap();
    assert_eq!(
        text,
        "6 0 5\n1 0 5\n1 0 1\n2 0 2\n4 0 4\n3 0 4\n9 0 0\n9 0 2\n"
    );
}

#[test]
fn test_cli_capacity_flag_fails_without_output() {
    let temp_dir = tempdir().unwrap();
    let input = temp_dir.path().join("big.pl0");
    fs::write(&input, COUNTER).unwrap();

    let cli = Cli::try_parse_from([
        "pl0c",
        "compile",
        input.to_str().unwrap(),
        "--code-capacity",
        "4",
    ])
    .unwrap();
    let error = CliHandler::new().handle(cli).unwrap_err();

    assert!(format!("{:#}", error).contains("code buffer capacity of 4 exceeded"));
    assert!(!temp_dir.path().join("big.obj").exists());
}

#[test]
fn test_cli_list_missing_file() {
    let temp_dir = tempdir().unwrap();
    let missing = temp_dir.path().join("nothing.obj");

    let cli = Cli::try_parse_from(["pl0c", "list", missing.to_str().unwrap()]).unwrap();
    let error = CliHandler::new().handle(cli).unwrap_err();
    assert!(error.to_string().contains("Failed to read object file"));
}

#[test]
fn test_cli_format_follows_output_extension() {
    let temp_dir = tempdir().unwrap();
    let input = temp_dir.path().join("p.pl0");
    fs::write(&input, "var x; x := 1.").unwrap();
    let expected = compile("var x; x := 1.", &CompilerConfig::default()).unwrap().program;

    for (name, format) in [("p.json", ObjectFormat::Json), ("p.bin", ObjectFormat::Binary)] {
        let output = temp_dir.path().join(name);
        let cli = Cli::try_parse_from([
            "pl0c",
            "compile",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();
        CliHandler::new().handle(cli).unwrap();

        assert_eq!(read_object_file(&output, format).unwrap(), expected, "{}", name);

        let cli = Cli::try_parse_from(["pl0c", "list", output.to_str().unwrap()]).unwrap();
        CliHandler::new().handle(cli).unwrap();
    }
}

#[test]
fn test_cli_explicit_format_overrides_extension() {
    let temp_dir = tempdir().unwrap();
    let input = temp_dir.path().join("p.pl0");
    let output = temp_dir.path().join("p.json");
    fs::write(&input, "var x; x := 1.").unwrap();

    let cli = Cli::try_parse_from([
        "pl0c",
        "compile",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--format",
        "text",
    ])
    .unwrap();
    CliHandler::new().handle(cli).unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "6 0 5\n1 0 1\n4 0 4\n9 0 2\n");
}
