//! Module loader (spec §4.3): resolves the transitive import graph rooted
//! at an entry file into one merged [`Program`].
mod loaderror;

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use log::trace;

use crate::ast::{parse_program, ImportStatement, Program, Statement};
use crate::diagnostics::{codes, DiagnosticSink};
use crate::preprocessor::preprocess;

pub use loaderror::FileLoadError;

/// Abstraction over reading source files, so tests can supply an in-memory
/// filesystem instead of touching disk.
pub trait FileReader {
    fn read_to_string(&self, path: &Path) -> Result<String, FileLoadError>;
}

/// Reads files straight off the OS filesystem.
pub struct OsFileReader;

impl FileReader for OsFileReader {
    fn read_to_string(&self, path: &Path) -> Result<String, FileLoadError> {
        fs::read_to_string(path).map_err(|err| FileLoadError {
            message: err.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Shortcuts certain import specifiers (e.g. `std/*`) to standard-library
/// paths, bypassing directory-relative resolution. Absence means `std/*`
/// imports fail to resolve, per spec §4.3.
pub trait StdLibLocator {
    fn resolve(&self, specifier: &str) -> Option<PathBuf>;
}

/// A single loaded module: its resolved path and the statements the parser
/// produced for it (import statements included, handled by the caller).
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub file_path: PathBuf,
    pub statements: Vec<Statement>,
}

pub type Modules = HashMap<PathBuf, Module>;

/// Derives a stable module name from a resolved file path, for use in
/// flattened variable naming (`moduleName_identifier`) during codegen.
fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "module".to_string())
}

pub struct ModuleLoader<'a> {
    reader: &'a dyn FileReader,
    std_lib: Option<&'a dyn StdLibLocator>,
}

impl<'a> ModuleLoader<'a> {
    pub fn new(reader: &'a dyn FileReader, std_lib: Option<&'a dyn StdLibLocator>) -> Self {
        Self { reader, std_lib }
    }

    /// Load `entry_path`, resolve its transitive imports, and return the
    /// merged program: imported declarations (dependency order,
    /// innermost-first) followed by the entry module's own statements.
    pub fn load(&self, entry_path: &Path, sink: &mut DiagnosticSink) -> Option<Program> {
        let entry_dir = entry_path.parent().unwrap_or_else(|| Path::new("."));
        let source = self.read_and_parse(entry_path, sink)?;

        let mut modules = Modules::new();
        let mut in_progress = HashSet::new();
        in_progress.insert(entry_path.to_path_buf());
        let mut emitted = HashSet::new();
        let mut imported = vec![];

        for statement in &source.statements {
            if let Statement::ImportStatement(import) = statement {
                self.resolve_and_load(
                    import,
                    entry_dir,
                    &mut modules,
                    &mut in_progress,
                    &mut emitted,
                    &mut imported,
                    sink,
                );
            }
        }

        let own: Vec<Statement> = source
            .statements
            .into_iter()
            .filter(|statement| !matches!(statement, Statement::ImportStatement(_)))
            .collect();

        imported.extend(own);
        Some(Program { statements: imported })
    }

    fn read_and_parse(&self, path: &Path, sink: &mut DiagnosticSink) -> Option<Program> {
        let raw = match self.reader.read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                sink.error(codes::UNKNOWN_IMPORT, err.to_string(), 0, 0);
                return None;
            }
        };
        let preprocessed = preprocess(&raw, sink);
        parse_program(&preprocessed.text, sink)
    }

    fn resolve_path(&self, specifier: &str, importer_dir: &Path) -> Option<PathBuf> {
        if let Some(locator) = self.std_lib {
            if let Some(resolved) = locator.resolve(specifier) {
                return Some(resolved);
            }
            if specifier.starts_with("std/") {
                return None;
            }
        } else if specifier.starts_with("std/") {
            return None;
        }

        Some(importer_dir.join(format!("{specifier}.bsh")))
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_and_load(
        &self,
        import: &ImportStatement,
        entry_dir: &Path,
        modules: &mut Modules,
        in_progress: &mut HashSet<PathBuf>,
        emitted: &mut HashSet<(PathBuf, String)>,
        out: &mut Vec<Statement>,
        sink: &mut DiagnosticSink,
    ) {
        let (line, col) = import.position;
        let specifier = import
            .module
            .as_deref()
            .or(import.from_module.as_deref())
            .unwrap_or_default();

        let Some(resolved) = self.resolve_path(specifier, entry_dir) else {
            sink.error(
                codes::UNKNOWN_IMPORT,
                format!("cannot resolve module '{specifier}'"),
                line,
                col,
            );
            return;
        };

        if in_progress.contains(&resolved) {
            sink.error(
                codes::CIRCULAR_IMPORT,
                format!("circular import involving '{}'", resolved.display()),
                line,
                col,
            );
            return;
        }

        if !modules.contains_key(&resolved) {
            trace!("loading module '{}'", resolved.display());
            in_progress.insert(resolved.clone());

            if let Some(program) = self.read_and_parse(&resolved, sink) {
                for statement in &program.statements {
                    if let Statement::ImportStatement(nested) = statement {
                        self.resolve_and_load(nested, entry_dir, modules, in_progress, emitted, out, sink);
                    }
                }
                modules.insert(
                    resolved.clone(),
                    Module {
                        name: module_name(&resolved),
                        file_path: resolved.clone(),
                        statements: program.statements,
                    },
                );
            }

            in_progress.remove(&resolved);
        }

        let Some(module) = modules.get(&resolved) else {
            return;
        };

        let wanted: Vec<String> = if import.module.is_some() {
            module
                .statements
                .iter()
                .filter(|statement| statement.is_exportable_kind() && statement.is_public())
                .filter_map(|statement| statement.declared_name().map(str::to_string))
                .collect()
        } else {
            import.items.clone()
        };

        for name in wanted {
            let key = (resolved.clone(), name.clone());
            if emitted.contains(&key) {
                continue;
            }
            match module
                .statements
                .iter()
                .find(|statement| statement.declared_name() == Some(name.as_str()))
            {
                Some(decl) if decl.is_exportable_kind() && decl.is_public() => {
                    emitted.insert(key);
                    out.push(decl.clone());
                }
                Some(_) => sink.error(
                    codes::PRIVATE_IMPORT,
                    format!("'{name}' is not public in '{}'", resolved.display()),
                    line,
                    col,
                ),
                None => sink.error(
                    codes::UNKNOWN_IMPORT,
                    format!("'{name}' not found in '{}'", resolved.display()),
                    line,
                    col,
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap as StdHashMap;

    struct MemoryFs(RefCell<StdHashMap<PathBuf, String>>);

    impl FileReader for MemoryFs {
        fn read_to_string(&self, path: &Path) -> Result<String, FileLoadError> {
            self.0
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| FileLoadError {
                    message: "not found".to_string(),
                    path: path.to_path_buf(),
                })
        }
    }

    fn fs_with(files: &[(&str, &str)]) -> MemoryFs {
        let mut map = StdHashMap::new();
        for (path, content) in files {
            map.insert(PathBuf::from(path), content.to_string());
        }
        MemoryFs(RefCell::new(map))
    }

    #[test]
    fn merges_public_declarations_in_dependency_order() {
        let fs = fs_with(&[
            ("/proj/main.bsh", "import { helper } from \"lib\"\nlet x: int = helper()\n"),
            ("/proj/lib.bsh", "pub fn helper(): int\n    return 1\nend\n"),
        ]);
        let loader = ModuleLoader::new(&fs, None);
        let mut sink = DiagnosticSink::new();
        let program = loader.load(Path::new("/proj/main.bsh"), &mut sink).unwrap();
        assert!(!sink.has_errors(), "{:?}", sink.diagnostics());
        assert_eq!(program.statements.len(), 2);
        assert_eq!(program.statements[0].declared_name(), Some("helper"));
    }

    #[test]
    fn importing_private_declaration_is_an_error() {
        let fs = fs_with(&[
            ("/proj/main.bsh", "import { helper } from \"lib\"\n"),
            ("/proj/lib.bsh", "fn helper(): int\n    return 1\nend\n"),
        ]);
        let loader = ModuleLoader::new(&fs, None);
        let mut sink = DiagnosticSink::new();
        loader.load(Path::new("/proj/main.bsh"), &mut sink);
        assert!(sink.diagnostics().iter().any(|d| d.code == codes::PRIVATE_IMPORT));
    }

    #[test]
    fn wildcard_import_of_module_with_no_public_declarations_succeeds() {
        let fs = fs_with(&[
            ("/proj/main.bsh", "import \"lib\"\n"),
            ("/proj/lib.bsh", "fn helper(): int\n    return 1\nend\n"),
        ]);
        let loader = ModuleLoader::new(&fs, None);
        let mut sink = DiagnosticSink::new();
        let program = loader.load(Path::new("/proj/main.bsh"), &mut sink).unwrap();
        assert!(!sink.has_errors(), "{:?}", sink.diagnostics());
        assert!(program.statements.is_empty());
    }

    #[test]
    fn circular_import_is_reported() {
        let fs = fs_with(&[
            ("/proj/main.bsh", "import \"a\"\n"),
            ("/proj/a.bsh", "import \"b\"\n"),
            ("/proj/b.bsh", "import \"a\"\n"),
        ]);
        let loader = ModuleLoader::new(&fs, None);
        let mut sink = DiagnosticSink::new();
        loader.load(Path::new("/proj/main.bsh"), &mut sink);
        assert!(sink.diagnostics().iter().any(|d| d.code == codes::CIRCULAR_IMPORT));
    }

    #[test]
    fn unresolved_std_import_without_locator_is_an_error() {
        let fs = fs_with(&[("/proj/main.bsh", "import \"std/fmt\"\n")]);
        let loader = ModuleLoader::new(&fs, None);
        let mut sink = DiagnosticSink::new();
        loader.load(Path::new("/proj/main.bsh"), &mut sink);
        assert!(sink.diagnostics().iter().any(|d| d.code == codes::UNKNOWN_IMPORT));
    }
}
