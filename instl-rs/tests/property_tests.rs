use proptest::prelude::*;
use instl::parse::parse;
use instl::ConfigVarStack;

fn sample_stack() -> ConfigVarStack {
    let mut vars = ConfigVarStack::new();
    vars.set("A", "alpha").unwrap();
    vars.set("L", vec!["1", "2", "3"]).unwrap();
    vars.set("F", "<$(__F_1__)>").unwrap();
    vars
}

proptest! {
    /// Text without `$` is returned untouched.
    #[test]
    fn no_marker_is_identity(s in "[^$]*") {
        let mut vars = sample_stack();
        prop_assert_eq!(vars.resolve_str(&s).unwrap(), s.clone());
        prop_assert_eq!(vars.resolve_str_to_list(&s).unwrap(), vec![s]);
    }
}

proptest! {
    /// Literal text plus verbatim reference text always rebuilds the input.
    #[test]
    fn segments_reassemble_input(s in "[$()<>\\[\\],=a-cA-C0-9 _-]*") {
        let rebuilt: String = parse(&s).map(|seg| seg.literal + &seg.original).collect();
        prop_assert_eq!(rebuilt, s);
    }
}

proptest! {
    /// With nothing defined, resolution never changes the input and never fails.
    #[test]
    fn undefined_references_pass_through(s in "\\PC*") {
        let mut vars = ConfigVarStack::new();
        prop_assert_eq!(vars.resolve_str(&s).unwrap(), s);
    }
}

proptest! {
    /// Resolution never panics or leaves scopes behind on arbitrary input.
    #[test]
    fn resolution_is_total(s in "[$()<>\\[\\],=AFL0-9_-]*") {
        let mut vars = sample_stack();
        let _ = vars.resolve_str(&s);
        prop_assert_eq!(vars.depth(), 1);
    }
}

proptest! {
    /// Indexing picks exactly one element of a non-empty list.
    #[test]
    fn index_selects_one(values in prop::collection::vec("[a-z]{1,4}", 1..6), raw in -6i64..6) {
        let mut vars = ConfigVarStack::new();
        vars.set("V", values.clone()).unwrap();
        let out = vars.resolve_str(&format!("$(V[{raw}])")).unwrap();
        let len = values.len() as i64;
        let i = if raw < 0 { len + raw } else { raw };
        if (0..len).contains(&i) {
            prop_assert_eq!(out, values[i as usize].clone());
        } else {
            prop_assert_eq!(out, format!("$(V[{raw}])"));
        }
    }
}
