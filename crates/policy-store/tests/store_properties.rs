//! Behavioral tests for the policy store contract.
//!
//! Each test exercises one observable guarantee of the store through its
//! public API only: probes never fail, tags are fixed by the first write,
//! scalar reads see the newest value, handles share sub-trees, and the two
//! copy flavors differ exactly in whether nested policies are shared.

use policy_store::{Policy, PolicyError, PolicyFile, Value, ValueType};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

const ALL_PROBES: [ValueType; 6] = [
    ValueType::Bool,
    ValueType::Int,
    ValueType::Double,
    ValueType::String,
    ValueType::Policy,
    ValueType::File,
];

fn probe(p: &Policy, name: &str, t: ValueType) -> bool {
    match t {
        ValueType::Bool => p.is_bool(name),
        ValueType::Int => p.is_int(name),
        ValueType::Double => p.is_double(name),
        ValueType::String => p.is_string(name),
        ValueType::Policy => p.is_policy(name),
        ValueType::File => p.is_file(name),
        ValueType::Undefined => false,
    }
}

fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e6..1.0e6f64).prop_map(Value::Double),
        "[a-z]{0,8}".prop_map(Value::String),
    ]
}

fn name_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z][a-z0-9_]{0,5}", 1..4).prop_map(|segs| segs.join("."))
}

#[test]
fn never_written_names_are_absent() {
    let mut p = Policy::new();
    p.set("present", 1).unwrap();

    for name in ["foo", "foo.bar", "present.child"] {
        assert!(!p.exists(name), "{name}");
        assert_eq!(p.value_count(name), 0, "{name}");
        for t in ALL_PROBES {
            assert!(!probe(&p, name, t), "{name} probed as {t}");
        }
    }
    assert!(p.get_type_info("foo").unwrap_err().is_name_not_found());
    assert!(p.get_type_info("foo.bar").unwrap_err().is_name_not_found());
}

#[test]
fn set_then_add_keeps_order_and_reads_newest() {
    let mut p = Policy::new();
    p.set("score", 3.4).unwrap();
    p.add("score", 1.355).unwrap();

    assert_eq!(p.value_count("score"), 2);
    assert_eq!(p.get_double("score").unwrap(), 1.355);
    assert_eq!(p.get_double_array("score").unwrap(), vec![3.4, 1.355]);
}

#[test]
fn tag_mismatch_on_write_fails_for_set_and_add() {
    let mut p = Policy::new();
    p.set("flag", true).unwrap();

    for bad in [Value::Int(1), Value::from("x"), Value::from(PolicyFile::new("f.paf"))] {
        assert!(matches!(p.set("flag", bad.clone()), Err(PolicyError::TypeError { .. })));
        assert!(matches!(p.add("flag", bad), Err(PolicyError::TypeError { .. })));
    }
    assert_eq!(p.value_count("flag"), 1);
}

#[test]
fn scalar_reads_check_tags() {
    let mut p = Policy::new();
    p.set("doall", "true").unwrap();

    assert!(p.exists("doall"));
    assert_eq!(p.get_string("doall").unwrap(), "true");
    assert!(p.get_int("doall").unwrap_err().is_type_error());
    assert!(p.get_bool_or("doall", false).unwrap_err().is_type_error());
    assert_eq!(p.get_bool_or("absent", true).unwrap(), true);
    assert_eq!(p.get_double_or("absent.deeper", 2.5).unwrap(), 2.5);
}

#[test]
fn handles_share_sub_trees() {
    let mut parent = Policy::new();
    parent.set("a.b", 1).unwrap();

    let h = parent.get_policy("a").unwrap();
    h.write().set("c", 2).unwrap();

    assert_eq!(parent.get_int("a.c").unwrap(), 2);
    assert_eq!(parent.get_int("a.b").unwrap(), 1);
}

#[test]
fn policy_arrays_share_elements() {
    let mut p = Policy::new();
    p.add("runs", Policy::new()).unwrap();
    p.add("runs", Policy::new()).unwrap();

    let runs = p.get_policy_array("runs").unwrap();
    assert_eq!(runs.len(), 2);
    runs[0].write().set("id", 0).unwrap();

    let again = p.get_policy_array("runs").unwrap();
    assert!(Arc::ptr_eq(&runs[0], &again[0]));
    assert_eq!(again[0].read().get_int("id").unwrap(), 0);
    assert!(!p.exists("runs.id"), "scalar path resolves through the newest policy only");
}

#[test]
fn shallow_copy_sees_later_sub_policy_mutation() {
    let standalone = "Dictionary.definition.standalone";
    let mut p = Policy::new();
    p.set(&format!("{standalone}.minOccurs"), 1).unwrap();
    let sp = p.get_policy(standalone).unwrap();
    sp.write().add("score", 3.4).unwrap();

    let shallow = p.shallow_copy();
    sp.write().add("score", 1.355).unwrap();
    assert_eq!(shallow.get_double(&format!("{standalone}.score")).unwrap(), 1.355);
}

#[test]
fn deep_copy_does_not_see_later_sub_policy_mutation() {
    let standalone = "Dictionary.definition.standalone";
    let mut p = Policy::new();
    p.set(&format!("{standalone}.minOccurs"), 1).unwrap();
    let sp = p.get_policy(standalone).unwrap();
    sp.write().add("score", 3.4).unwrap();

    let deep = p.deep_copy();
    sp.write().add("score", 1.355).unwrap();
    assert_eq!(deep.get_double(&format!("{standalone}.score")).unwrap(), 3.4);
    assert_eq!(p.get_double(&format!("{standalone}.score")).unwrap(), 1.355);
}

#[test]
fn names_partition_by_tag() {
    let mut p = Policy::new();
    p.set("doall", "duh").unwrap();
    p.set("Dictionary.definition.standalone.minOccurs", 1).unwrap();
    p.add("test", PolicyFile::new("test.paf")).unwrap();
    p.set("ratio", 0.5).unwrap();

    let all = p.names();
    assert_eq!(
        all.len(),
        p.policy_names().len() + p.param_names().len() + p.file_names().len()
    );
    for name in &all {
        assert!(p.get_type_name(name).is_ok());
    }
}

proptest! {
    #[test]
    fn prop_set_then_get_roundtrips(name in name_strategy(), value in scalar_strategy()) {
        let mut p = Policy::new();
        p.set(&name, value.clone()).unwrap();
        prop_assert!(p.exists(&name));
        prop_assert_eq!(p.value_count(&name), 1);
        prop_assert_eq!(p.get(&name).unwrap(), value.clone());
        prop_assert_eq!(p.get_type_info(&name).unwrap(), value.value_type());
    }

    #[test]
    fn prop_adds_accumulate_in_order(name in name_strategy(), xs in proptest::collection::vec(any::<i64>(), 1..10)) {
        let mut p = Policy::new();
        for x in &xs {
            p.add(&name, *x).unwrap();
        }
        prop_assert_eq!(p.value_count(&name), xs.len());
        prop_assert_eq!(p.get_int(&name).unwrap(), *xs.last().unwrap());
        prop_assert_eq!(p.get_int_array(&name).unwrap(), xs);
    }

    #[test]
    fn prop_single_tag_per_name(name in name_strategy(), first in scalar_strategy(), second in scalar_strategy()) {
        let mut p = Policy::new();
        p.add(&name, first.clone()).unwrap();
        let result = p.add(&name, second.clone());
        if first.value_type() == second.value_type() {
            prop_assert!(result.is_ok());
            prop_assert_eq!(p.value_count(&name), 2);
        } else {
            prop_assert!(result.unwrap_err().is_type_error());
            prop_assert_eq!(p.value_count(&name), 1);
        }
        let values = p.get_values(&name).unwrap();
        prop_assert!(values.iter().all(|v| v.value_type() == first.value_type()));
    }

    #[test]
    fn prop_deep_copy_equals_source(names in proptest::collection::vec(name_strategy(), 1..6)) {
        let mut p = Policy::new();
        for (i, name) in names.iter().enumerate() {
            // earlier names may already be sub-policies or scalars; ignore tag clashes
            let _ = p.add(name, i as i64);
        }
        prop_assert_eq!(p.deep_copy(), p.clone());
    }
}
