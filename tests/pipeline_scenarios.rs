//! End-to-end pipeline scenarios (spec §8, "End-to-end scenarios").
//! These assert on the emitted script text and diagnostics rather than
//! executing the generated shell, since the test harness never shells out.
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use brash::loader::{FileLoadError, FileReader};
use brash::{compile_with_reader, CompileOptions};

struct MemoryFs(RefCell<HashMap<PathBuf, String>>);

impl FileReader for MemoryFs {
    fn read_to_string(&self, path: &Path) -> Result<String, FileLoadError> {
        self.0
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| FileLoadError { message: "not found".to_string(), path: path.to_path_buf() })
    }
}

fn single_file(source: &str) -> MemoryFs {
    let mut map = HashMap::new();
    map.insert(PathBuf::from("/proj/main.bsh"), source.to_string());
    MemoryFs(RefCell::new(map))
}

fn compile(source: &str) -> brash::CompileResult {
    let fs = single_file(source);
    let options = CompileOptions::default();
    compile_with_reader(Path::new("/proj/main.bsh"), &fs, &options)
}

#[test]
fn function_and_arithmetic() {
    let result = compile(
        "fn inc(x: int): int\n    return x + 1\nend\nlet value = inc(41)\nexec(\"printf\", \"%s\\n\", value)\n",
    );
    assert!(result.succeeded(), "{:?}", result.sink.diagnostics().iter().map(|d| d.to_string()).collect::<Vec<_>>());
    let script = result.script.unwrap();
    assert!(script.starts_with("#!/usr/bin/env bash\n"));
    assert!(script.contains("set -euo pipefail"));
    assert!(script.contains("inc() {"));
    assert!(script.contains("return $(( (${x} + 1) ))") || script.contains("echo $(( (${x} + 1) ))"));
}

#[test]
fn struct_and_enum_declaration_flattens_fields() {
    let source = "struct Person {\n    age: int,\n    level: int,\n}\nenum JobLevel {\n    Junior,\n    Senior,\n}\nlet person = Person{age: 30, level: 1}\n";
    let result = compile(source);
    assert!(result.succeeded(), "{:?}", result.sink.diagnostics().iter().map(|d| d.to_string()).collect::<Vec<_>>());
    let script = result.script.unwrap();
    assert!(script.contains("person__type=\"Person\""));
    assert!(script.contains("person_age=30"));
    assert!(script.contains("readonly JobLevel_Junior=\"Junior\""));
    assert!(script.contains("readonly JobLevel_Senior=\"Senior\""));
}

#[test]
fn command_pipeline_uses_pipe_helper() {
    let source = "exec(cmd(\"printf\", \"abc\\n\") | cmd(\"tr\", \"a-z\", \"A-Z\"))\n";
    let result = compile(source);
    assert!(result.succeeded(), "{:?}", result.sink.diagnostics().iter().map(|d| d.to_string()).collect::<Vec<_>>());
    let script = result.script.unwrap();
    assert!(script.contains("brash_pipe_cmd"));
    assert!(script.contains("brash_build_cmd"));
}

#[test]
fn try_catch_redirects_stderr_to_a_file() {
    let source = "try\n    throw \"boom\"\ncatch err\n    exec(\"printf\", \"caught:%s\\n\", err)\nend\n";
    let result = compile(source);
    assert!(result.succeeded(), "{:?}", result.sink.diagnostics().iter().map(|d| d.to_string()).collect::<Vec<_>>());
    let script = result.script.unwrap();
    assert!(script.contains("brash_throw"));
    assert!(script.contains("__err_file"));
}

#[test]
fn main_with_int_return_lowers_to_shell_exit_status() {
    let source = "fn main(args: string[]): int\n    return 7\nend\n";
    let result = compile(source);
    assert!(result.succeeded(), "{:?}", result.sink.diagnostics().iter().map(|d| d.to_string()).collect::<Vec<_>>());
    let script = result.script.unwrap();
    assert!(script.contains("local -a args=(\"$@\")"));
    assert!(script.contains("return $(( 7 ))"));
    assert!(script.trim_end().ends_with("main \"$@\""));
}

#[test]
fn public_non_const_top_level_variable_is_rejected() {
    let result = compile("pub let x = 1\n");
    assert!(!result.succeeded());
    assert!(result.sink.diagnostics().iter().any(|d| d.code == brash::diagnostics::codes::PUBLIC_NON_CONST));
}

#[test]
fn main_with_wrong_signature_is_rejected() {
    let result = compile("fn main(x: int, y: int): int\n    return 0\nend\n");
    assert!(!result.succeeded());
    assert!(result.sink.diagnostics().iter().any(|d| d.code == brash::diagnostics::codes::INVALID_MAIN_SIGNATURE));
}
