//! Probe injection into parsed script units.
//!
//! Transformation is two steps over the syntax tree: make sure the probe
//! decorator is importable under a known binding, then annotate every
//! function declaration that does not already carry a marker. Annotations
//! apply bottom-up, so appending puts the probe closest to the function,
//! inside whatever decorators the author wrote.
//!
//! Running the transform over already-transformed source changes nothing:
//! the injected import satisfies the module-and-name match and the injected
//! annotations are markers themselves.

use crate::domain::TransformError;
use memscope_script::ast::{
    Annotation, Block, FnDecl, Item, ModulePath, Program, Stmt, StmtKind, UseDecl,
};
use memscope_script::parser;
use memscope_script::span::Span;
use smol_str::SmolStr;
use std::path::Path;

/// Module exposing the probe decorator to scripts.
pub const PROBE_MODULE: &str = "profiler";
/// Member imported from [`PROBE_MODULE`].
pub const PROBE_NAME: &str = "probe";
/// Binding name used when the unit does not import the probe itself.
pub const PROBE_ALIAS: &str = "__ms_probe";

/// Functions already annotated with one of these are left alone. `memo`
/// builds a cache wrapper whose calls the probe would misattribute.
pub const MARKER_ANNOTATIONS: &[&str] = &["__ms_probe", "probe", "memo"];

/// Parse `source` and return its instrumented tree.
///
/// Parse failures and alias conflicts leave the unit untouched; the caller
/// decides whether that is fatal (entry scripts) or a fallback to the
/// original source (modules).
pub fn transform(source: &str, origin: &Path) -> Result<Program, TransformError> {
    let mut program = parser::parse(source).map_err(|e| TransformError::Parse {
        path: origin.to_path_buf(),
        line: e.line,
        column: e.column,
        message: e.message,
    })?;
    let binding = ensure_probe_import(&mut program, origin)?;
    inject_probes(&mut program, &binding);
    Ok(program)
}

/// Make the probe decorator reachable and return the name it is bound to.
///
/// An existing `use profiler.probe` is reused whatever its alias; otherwise
/// a `use profiler.probe as __ms_probe;` is inserted after the unit's
/// leading imports.
pub fn ensure_probe_import(
    program: &mut Program,
    origin: &Path,
) -> Result<SmolStr, TransformError> {
    for item in &program.items {
        if let Item::Use(decl) = item {
            if decl.module.dotted() == PROBE_MODULE && decl.name == PROBE_NAME {
                return Ok(decl.alias.clone().unwrap_or_else(|| decl.name.clone()));
            }
        }
    }
    if binds_at_top_level(program, PROBE_ALIAS) {
        return Err(TransformError::AliasConflict {
            path: origin.to_path_buf(),
            alias: PROBE_ALIAS.to_string(),
        });
    }
    let insert_at = program
        .items
        .iter()
        .take_while(|item| matches!(item, Item::Use(_) | Item::Import(_)))
        .count();
    program.items.insert(
        insert_at,
        Item::Use(UseDecl {
            module: ModulePath::from_dotted(PROBE_MODULE),
            name: SmolStr::new(PROBE_NAME),
            alias: Some(SmolStr::new(PROBE_ALIAS)),
            span: Span::dummy(),
        }),
    );
    Ok(SmolStr::new(PROBE_ALIAS))
}

/// Annotate every unmarked function declaration in the unit, at any
/// nesting depth.
pub fn inject_probes(program: &mut Program, binding: &SmolStr) {
    for item in &mut program.items {
        match item {
            Item::Fn(decl) => mark_fn(decl, binding),
            Item::Stmt(stmt) => mark_stmt(stmt, binding),
            Item::Use(_) | Item::Import(_) => {}
        }
    }
}

fn binds_at_top_level(program: &Program, name: &str) -> bool {
    program.items.iter().any(|item| match item {
        Item::Fn(decl) => decl.name == name,
        Item::Use(decl) => decl.alias.as_deref().unwrap_or(decl.name.as_str()) == name,
        Item::Import(decl) => decl.module.leaf() == name,
        Item::Stmt(stmt) => matches!(&stmt.kind, StmtKind::Let { name: bound, .. } if bound == name),
    })
}

fn mark_fn(decl: &mut FnDecl, binding: &SmolStr) {
    if !has_marker(decl, binding) {
        decl.annotations.push(Annotation::synthesized(binding.as_str()));
    }
    mark_block(&mut decl.body, binding);
}

fn has_marker(decl: &FnDecl, binding: &SmolStr) -> bool {
    decl.annotations.iter().any(|annotation| {
        annotation.name == *binding || MARKER_ANNOTATIONS.contains(&annotation.name.as_str())
    })
}

fn mark_block(block: &mut Block, binding: &SmolStr) {
    for stmt in &mut block.stmts {
        mark_stmt(stmt, binding);
    }
}

fn mark_stmt(stmt: &mut Stmt, binding: &SmolStr) {
    match &mut stmt.kind {
        StmtKind::Fn(decl) => mark_fn(decl, binding),
        StmtKind::If { then_block, else_block, .. } => {
            mark_block(then_block, binding);
            if let Some(block) = else_block {
                mark_block(block, binding);
            }
        }
        StmtKind::While { body, .. } | StmtKind::For { body, .. } => mark_block(body, binding),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn origin() -> PathBuf {
        PathBuf::from("unit.mss")
    }

    fn probe_uses(program: &Program) -> usize {
        program
            .items
            .iter()
            .filter(|item| {
                matches!(item, Item::Use(decl)
                    if decl.module.dotted() == PROBE_MODULE && decl.name == PROBE_NAME)
            })
            .count()
    }

    fn fn_annotations<'a>(program: &'a Program, name: &str) -> Vec<&'a str> {
        for item in &program.items {
            if let Item::Fn(decl) = item {
                if decl.name == name {
                    return decl.annotations.iter().map(|a| a.name.as_str()).collect();
                }
            }
        }
        panic!("no function `{name}` at top level");
    }

    #[test]
    fn test_injects_import_and_annotation() {
        let program = transform("fn f() { return 1; }\n", &origin()).unwrap();
        assert_eq!(probe_uses(&program), 1);
        let Item::Use(decl) = &program.items[0] else { panic!("expected use item first") };
        assert_eq!(decl.alias.as_deref(), Some(PROBE_ALIAS));
        assert_eq!(fn_annotations(&program, "f"), vec![PROBE_ALIAS]);
    }

    #[test]
    fn test_import_lands_after_leading_imports() {
        let program = transform("import util;\nfn f() { return 1; }\n", &origin()).unwrap();
        assert!(matches!(&program.items[0], Item::Import(_)));
        assert!(matches!(&program.items[1], Item::Use(_)));
    }

    #[test]
    fn test_probe_appended_after_existing_annotations() {
        let program = transform("@trace\nfn f() { return 1; }\n", &origin()).unwrap();
        assert_eq!(fn_annotations(&program, "f"), vec!["trace", PROBE_ALIAS]);
    }

    #[test]
    fn test_existing_probe_import_reused_with_its_alias() {
        let source = "use profiler.probe as watch;\nfn f() { return 1; }\n";
        let program = transform(source, &origin()).unwrap();
        assert_eq!(probe_uses(&program), 1);
        assert_eq!(fn_annotations(&program, "f"), vec!["watch"]);
    }

    #[test]
    fn test_marker_annotations_exempt_functions() {
        let source = "@memo\nfn cached() { return 1; }\n@probe\nfn manual() { return 2; }\n";
        let program = transform(source, &origin()).unwrap();
        assert_eq!(fn_annotations(&program, "cached"), vec!["memo"]);
        assert_eq!(fn_annotations(&program, "manual"), vec!["probe"]);
    }

    #[test]
    fn test_nested_functions_probed() {
        let source = "fn outer() {
            fn inner() { return 1; }
            if true {
                fn branched() { return 2; }
                return branched();
            }
            return inner();
        }\n";
        let program = transform(source, &origin()).unwrap();
        let Item::Fn(outer) = &program.items[1] else { panic!("expected fn item") };
        let StmtKind::Fn(inner) = &outer.body.stmts[0].kind else { panic!("expected nested fn") };
        assert_eq!(inner.annotations.len(), 1);
        let StmtKind::If { then_block, .. } = &outer.body.stmts[1].kind else {
            panic!("expected if")
        };
        let StmtKind::Fn(branched) = &then_block.stmts[0].kind else {
            panic!("expected fn in branch")
        };
        assert_eq!(branched.annotations.len(), 1);
    }

    #[test]
    fn test_async_functions_probed_like_sync() {
        let program = transform("async fn f() { return 1; }\n", &origin()).unwrap();
        assert_eq!(fn_annotations(&program, "f"), vec![PROBE_ALIAS]);
    }

    #[test]
    fn test_retransform_changes_nothing() {
        let mut program = transform("fn f() { return 1; }\nfn g() { return 2; }\n", &origin())
            .unwrap();
        let binding = ensure_probe_import(&mut program, &origin()).unwrap();
        inject_probes(&mut program, &binding);
        assert_eq!(probe_uses(&program), 1);
        assert_eq!(fn_annotations(&program, "f"), vec![PROBE_ALIAS]);
        assert_eq!(fn_annotations(&program, "g"), vec![PROBE_ALIAS]);
    }

    #[test]
    fn test_alias_conflict_rejected() {
        let err = transform("fn __ms_probe() { return 1; }\n", &origin()).unwrap_err();
        assert!(matches!(err, TransformError::AliasConflict { .. }));
        let err = transform("let __ms_probe = 3;\n", &origin()).unwrap_err();
        assert!(matches!(err, TransformError::AliasConflict { .. }));
    }

    #[test]
    fn test_parse_failure_carries_position() {
        let err = transform("fn f( {\n", &origin()).unwrap_err();
        let TransformError::Parse { line, message, .. } = err else {
            panic!("expected parse error")
        };
        assert_eq!(line, 1);
        assert!(!message.is_empty());
    }
}
