//! Quantified optimizer properties and boundary behaviors (spec §8).
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

fn compile(source: &str) -> brash::CompileResult {
    let mut map = HashMap::new();
    map.insert(PathBuf::from("/proj/main.bsh"), source.to_string());
    let fs = MemoryFs(RefCell::new(map));
    compile_with_reader(Path::new("/proj/main.bsh"), &fs, &CompileOptions::default())
}

#[test]
fn while_false_loop_optimizes_away_entirely() {
    let result = compile("while false\n    let x = 1\nend\n");
    assert!(result.succeeded(), "{:?}", result.sink.diagnostics().iter().map(|d| d.to_string()).collect::<Vec<_>>());
    let script = result.script.unwrap();
    assert!(!script.contains("while"));
}

#[test]
fn dead_pure_local_is_elided() {
    let result = compile("let unused = 1 + 2\nexec(\"printf\", \"ok\\n\")\n");
    assert!(result.succeeded(), "{:?}", result.sink.diagnostics().iter().map(|d| d.to_string()).collect::<Vec<_>>());
    let script = result.script.unwrap();
    assert!(!script.contains("unused"));
}

#[test]
fn constant_folded_arithmetic_propagates_and_drops_the_dead_local() {
    let result = compile("let total = 2 + 3\nexec(\"printf\", \"%s\\n\", total)\n");
    assert!(result.succeeded(), "{:?}", result.sink.diagnostics().iter().map(|d| d.to_string()).collect::<Vec<_>>());
    let script = result.script.unwrap();
    // `total` folds to the literal `5`, propagates into the `exec` call, and
    // its now-dead declaration is elided by dead-local elimination.
    assert!(script.contains('5'));
    assert!(!script.contains("total"));
}

#[test]
fn constant_propagation_substitutes_into_condition() {
    let source = "let flag = true\nif flag\n    exec(\"printf\", \"yes\\n\")\nend\n";
    let result = compile(source);
    assert!(result.succeeded(), "{:?}", result.sink.diagnostics().iter().map(|d| d.to_string()).collect::<Vec<_>>());
    let script = result.script.unwrap();
    // `flag` propagates to `true`, the `if` collapses, and `flag`'s own
    // declaration becomes dead and is elided.
    assert!(!script.contains("flag"));
    assert!(script.contains("printf"));
}

#[test]
fn redundant_null_coalesce_on_non_nullable_is_a_warning() {
    let result = compile("let x: int = 3\nlet y = x ?? 9\n");
    assert!(result.succeeded(), "{:?}", result.sink.diagnostics().iter().map(|d| d.to_string()).collect::<Vec<_>>());
    assert!(result.sink.diagnostics().iter().any(|d| d.code == brash::diagnostics::codes::REDUNDANT_COALESCE));
}
