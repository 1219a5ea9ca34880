//! End-to-end resolution behaviour through the public API.

use std::sync::Arc;
use std::thread;

use instl::{ConfigVarStack, DefineDoc, RawValue, VarError};

fn stack(defs: &[(&str, &[&str])]) -> ConfigVarStack {
    let mut vars = ConfigVarStack::new();
    for (name, values) in defs {
        vars.set(name, values.to_vec()).unwrap();
    }
    vars
}

#[test]
fn single_reference_resolves_to_value() {
    let mut vars = stack(&[("A", &["value"])]);
    assert_eq!(vars.resolve_str("$(A)").unwrap(), "value");
}

#[test]
fn array_indexing() {
    let mut vars = stack(&[("A", &["1", "2", "3"])]);
    assert_eq!(vars.resolve_str("$(A[0])").unwrap(), "1");
    assert_eq!(vars.resolve_str("$(A[-1])").unwrap(), "3");
    assert_eq!(vars.resolve_str("$(A[2])$(A[1])$(A[0])").unwrap(), "321");
}

#[test]
fn chained_references() {
    let mut vars = stack(&[("A", &["$(B)"]), ("B", &["$(C)"]), ("C", &["ali baba"])]);
    assert_eq!(vars.resolve_str("$(A)").unwrap(), "ali baba");
}

#[test]
fn circular_reference_fails() {
    let mut vars = stack(&[("A", &["$(B)"]), ("B", &["$(A)"])]);
    let err = vars.resolve_str("$(A)").unwrap_err();
    assert!(matches!(err, VarError::CircularReference { .. }));
    assert_eq!(err.to_string(), "circular reference: A -> B -> A");
    // The stack is usable afterwards.
    vars.set("B", "fixed").unwrap();
    assert_eq!(vars.resolve_str("$(A)").unwrap(), "fixed");
}

#[test]
fn scoped_shadowing() {
    let mut vars = stack(&[("X", &["outer"])]);
    {
        let mut scope = vars.push_scope();
        scope.set("X", "1").unwrap();
        assert_eq!(scope.resolve_str("$(X)").unwrap(), "1");
    }
    assert_eq!(vars.resolve_str("$(X)").unwrap(), "outer");
}

#[test]
fn parameter_binding_is_local_to_the_expansion() {
    let mut vars = stack(&[("F", &["f($(__F_1__))"])]);
    assert_eq!(vars.resolve_str("$(F<param>)").unwrap(), "f(param)");
    assert_eq!(vars.resolve_str("$(__F_1__)").unwrap(), "$(__F_1__)");
    assert_eq!(vars.resolve_str("$(F)").unwrap(), "f($(__F_1__))");
}

#[test]
fn to_list_keeps_multi_values_only_for_bare_reference() {
    let mut vars = stack(&[("L", &["a", "b", "c"])]);
    assert_eq!(vars.resolve_str_to_list("$(L)").unwrap().len(), 3);
    assert_eq!(vars.resolve_str_to_list("x$(L)").unwrap(), vec!["xabc"]);
}

#[test]
fn malformed_input_is_reproduced() {
    let mut vars = stack(&[("A", &["a"])]);
    for s in ["$(A", "$(A[x])", "$(A[9])", "$()", "$(A<1>", "cost: $5", "$(A B)"] {
        assert_eq!(vars.resolve_str(s).unwrap(), s, "{s}");
    }
    assert_eq!(vars.resolve_str("$(A)$(A").unwrap(), "a$(A");
}

#[test]
fn path_variables_normalized_in_lists() {
    let dir = tempfile::tempdir().unwrap();
    let mut vars = ConfigVarStack::new();
    vars.set("BASE", dir.path()).unwrap();
    vars.set("WORK_DIR", "$(BASE)/./").unwrap();
    let canonical = dir.path().canonicalize().unwrap();
    assert_eq!(
        vars.resolve_var_to_list("WORK_DIR").unwrap(),
        vec![canonical.to_string_lossy().into_owned()]
    );
    assert_eq!(
        vars.resolve_str_to_list("$(WORK_DIR)").unwrap(),
        vec![canonical.to_string_lossy().into_owned()]
    );
    // Plain string resolution leaves the text alone.
    let raw = vars.resolve_str("$(WORK_DIR)").unwrap();
    assert!(raw.ends_with("/./"), "{raw}");
}

#[test]
fn list_of_names_and_text() {
    let doc = DefineDoc::load_str("SOURCES: [a.c, b.c]\nEXTRA: x.c\n").0;
    let mut vars = ConfigVarStack::new();
    vars.read_defines(&doc).unwrap();
    let out = vars
        .resolve_list_to_list(&["SOURCES", "$(EXTRA)", "main.c"])
        .unwrap();
    assert_eq!(out, vec!["a.c", "b.c", "x.c", "main.c"]);
}

#[test]
fn type_error_on_mapping() {
    let mut vars = ConfigVarStack::new();
    let map = RawValue::Map(vec![("k".into(), "v".into())]);
    assert!(matches!(vars.set("M", map), Err(VarError::Type { .. })));
}

#[test]
fn shared_stack_across_threads() {
    let mut vars = ConfigVarStack::new();
    vars.set("F", "<$(__F_1__)>").unwrap();
    let shared = vars.into_shared();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let text = format!("$(F<{n}>)");
                let mut guard = shared.lock().unwrap();
                guard.resolve_str(&text).unwrap()
            })
        })
        .collect();

    let mut results: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort();
    let expected: Vec<String> = (0..8).map(|n| format!("<{n}>")).collect();
    assert_eq!(results, expected);
    assert_eq!(shared.lock().unwrap().depth(), 1);
}

#[test]
fn independent_stacks_do_not_interfere() {
    let mut a = stack(&[("X", &["$(Y)"]), ("Y", &["a"])]);
    let mut b = stack(&[("X", &["b"])]);
    assert_eq!(a.resolve_str("$(X)").unwrap(), "a");
    assert_eq!(b.resolve_str("$(X)").unwrap(), "b");
}
