//! Property tests: rendered PAF parses back into the tree it came from.

use policy_format::{parse_str, to_paf_string, PafWriter};
use policy_store::{Policy, PolicyFile};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Leaf {
    Bools(Vec<bool>),
    Ints(Vec<i64>),
    Doubles(Vec<f64>),
    Strings(Vec<String>),
    Files(Vec<String>),
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Leaf),
    Children(Vec<Tree>),
}

#[derive(Debug, Clone)]
struct Tree(BTreeMap<String, Node>);

fn name() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_-]{0,6}"
}

fn leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        vec(any::<bool>(), 1..4).prop_map(Leaf::Bools),
        vec(any::<i64>(), 1..4).prop_map(Leaf::Ints),
        vec(-1.0e12..1.0e12f64, 1..4).prop_map(Leaf::Doubles),
        vec("[ -~\t\n]{0,12}", 1..4).prop_map(Leaf::Strings),
        vec("[a-z/._-]{1,12}", 1..3).prop_map(Leaf::Files),
    ]
    .prop_map(Node::Leaf)
}

fn tree() -> impl Strategy<Value = Tree> {
    let flat = btree_map(name(), leaf(), 0..5).prop_map(Tree);
    flat.prop_recursive(3, 32, 5, |inner| {
        btree_map(
            name(),
            prop_oneof![leaf(), vec(inner, 1..3).prop_map(Node::Children)],
            0..5,
        )
        .prop_map(Tree)
    })
}

fn build(tree: &Tree) -> Policy {
    let mut p = Policy::new();
    for (name, node) in &tree.0 {
        match node {
            Node::Leaf(Leaf::Bools(xs)) => xs.iter().for_each(|x| p.add(name, *x).unwrap()),
            Node::Leaf(Leaf::Ints(xs)) => xs.iter().for_each(|x| p.add(name, *x).unwrap()),
            Node::Leaf(Leaf::Doubles(xs)) => xs.iter().for_each(|x| p.add(name, *x).unwrap()),
            Node::Leaf(Leaf::Strings(xs)) => xs.iter().for_each(|x| p.add(name, x.as_str()).unwrap()),
            Node::Leaf(Leaf::Files(xs)) => xs
                .iter()
                .for_each(|x| p.add(name, PolicyFile::new(x.clone())).unwrap()),
            Node::Children(children) => children.iter().for_each(|c| p.add(name, build(c)).unwrap()),
        }
    }
    p
}

proptest! {
    #[test]
    fn prop_rendered_tree_parses_back(tree in tree()) {
        let original = build(&tree);
        let text = to_paf_string(&original);
        let parsed = parse_str(&text, true).unwrap();
        prop_assert_eq!(parsed, original, "rendered:\n{}", text);
    }

    #[test]
    fn prop_indent_does_not_change_meaning(tree in tree(), indent in 0usize..8) {
        let original = build(&tree);
        let text = PafWriter::new().with_indent(indent).render(&original);
        prop_assert_eq!(parse_str(&text, true).unwrap(), original);
    }

    #[test]
    fn prop_dotted_lines_match_direct_adds(
        lines in vec((vec("[a-z]{1,3}", 1..4), any::<i32>()), 1..12)
    ) {
        let mut expected = Policy::new();
        let mut text = String::from("# <?cfg PAF ?>\n");
        for (segments, value) in &lines {
            let name = segments.join(".");
            // names clashing with an earlier scalar are skipped on both sides
            if expected.add(&name, *value).is_ok() {
                text.push_str(&format!("{name} = {value}\n"));
            }
        }
        prop_assert_eq!(parse_str(&text, true).unwrap(), expected);
    }
}
