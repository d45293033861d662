//! Shared test utilities for query tree testing

use crate::query::{Argument, Directive, Document, Field, OperationDefinition, Selection, SelectionSet};

/// Small deterministic generator so property checks are reproducible without extra crates.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg(seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407))
    }

    pub fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }

    pub fn chance(&mut self, percent: u64) -> bool {
        self.below(100) < percent
    }
}

/// A random anonymous query. Roughly a third of the fields carry `@local`, some are aliased, some
/// have arguments. Field names are unique within each selection set.
pub fn random_document(rng: &mut Lcg) -> Document {
    let selection_set = random_selection_set(rng, 0);
    Document {
        operations: vec![OperationDefinition {
            selection_set,
            ..Default::default()
        }],
        fragments: Vec::new(),
    }
}

fn random_selection_set(rng: &mut Lcg, depth: usize) -> SelectionSet {
    let width = 1 + rng.below(3) as usize;
    let mut items = Vec::with_capacity(width);
    for idx in 0..width {
        let mut field = Field::leaf(&format!("f{depth}_{idx}"));
        if rng.chance(20) {
            field.alias = Some(format!("a{depth}_{idx}"));
        }
        if rng.chance(25) {
            field.arguments.push(Argument {
                name: "id".to_string(),
                value: rng.below(100).to_string(),
            });
        }
        if rng.chance(33) {
            field.directives.push(Directive {
                name: "local".to_string(),
                arguments: Vec::new(),
            });
        }
        if depth < 3 && rng.chance(50) {
            field.selection_set = Some(random_selection_set(rng, depth + 1));
        }
        items.push(Selection::Field(field));
    }
    SelectionSet::new(items)
}

/// Response-key paths of the outermost local fields in `set`, in key order.
pub fn expected_local_paths(set: &SelectionSet) -> Vec<Vec<String>> {
    let mut paths = Vec::new();
    collect_local_paths(set, &mut Vec::new(), &mut paths);
    paths.sort();
    paths
}

fn collect_local_paths(set: &SelectionSet, prefix: &mut Vec<String>, paths: &mut Vec<Vec<String>>) {
    for item in set.items.iter() {
        let Selection::Field(field) = item else {
            continue;
        };
        prefix.push(field.response_key().to_string());
        if field.has_directive("local") {
            paths.push(prefix.clone());
        } else if let Some(child) = &field.selection_set {
            collect_local_paths(child, prefix, paths);
        }
        prefix.pop();
    }
}

/// True when any selection set below `set` (or `set` itself) is empty.
pub fn has_empty_selection_set(set: &SelectionSet) -> bool {
    set.is_empty()
        || set.items.iter().any(|item| match item {
            Selection::Field(field) => field
                .selection_set
                .as_ref()
                .is_some_and(has_empty_selection_set),
            Selection::InlineFragment(fragment) => has_empty_selection_set(&fragment.selection_set),
            Selection::FragmentSpread(_) => false,
        })
}
