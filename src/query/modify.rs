use std::collections::BTreeMap;

use super::{Document, Field, FragmentDefinition, InlineFragment, Selection, SelectionSet};
use crate::error::ClientError;

/// Return a copy of `document` where every selection set contains each of `field_names` as a
/// direct child field. Selection sets that already select a name are left alone.
pub fn add_fields<S: AsRef<str>>(document: &Document, field_names: &[S]) -> Document {
    let mut updated = document.clone();
    for op in updated.operations.iter_mut() {
        add_to_selection_set(&mut op.selection_set, field_names);
    }
    for fragment in updated.fragments.iter_mut() {
        add_to_selection_set(&mut fragment.selection_set, field_names);
    }
    updated
}

fn add_to_selection_set<S: AsRef<str>>(set: &mut SelectionSet, field_names: &[S]) {
    for item in set.items.iter_mut() {
        match item {
            Selection::Field(Field {
                selection_set: Some(child),
                ..
            }) => add_to_selection_set(child, field_names),
            Selection::InlineFragment(fragment) => {
                add_to_selection_set(&mut fragment.selection_set, field_names)
            }
            _ => {}
        }
    }
    for name in field_names {
        let name = name.as_ref();
        if !set.has_field(name) {
            set.items.push(Selection::Field(Field::leaf(name)));
        }
    }
}

/// Return a copy of `document` without any field named in `field_names`.
///
/// A removed field takes its whole subtree with it. Fields, inline fragments and fragment
/// definitions that end up with an empty selection set are removed as well so that the result
/// remains a valid query.
pub fn remove_fields<S: AsRef<str>>(document: &Document, field_names: &[S]) -> Document {
    let mut updated = document.clone();
    for op in updated.operations.iter_mut() {
        remove_from_selection_set(&mut op.selection_set, field_names);
    }
    for fragment in updated.fragments.iter_mut() {
        remove_from_selection_set(&mut fragment.selection_set, field_names);
    }
    updated
}

fn remove_from_selection_set<S: AsRef<str>>(set: &mut SelectionSet, field_names: &[S]) {
    set.items.retain_mut(|item| match item {
        Selection::Field(field) => {
            if field_names.iter().any(|name| name.as_ref() == field.name) {
                return false;
            }
            match field.selection_set.as_mut() {
                Some(child) if !child.is_empty() => {
                    remove_from_selection_set(child, field_names);
                    !child.is_empty()
                }
                _ => true,
            }
        }
        Selection::InlineFragment(fragment) => {
            remove_from_selection_set(&mut fragment.selection_set, field_names);
            !fragment.selection_set.is_empty()
        }
        Selection::FragmentSpread(_) => true,
    });
}

/// Replace every named fragment spread with an inline fragment carrying the fragment's type
/// condition and selections, then drop the fragment definitions.
///
/// Spreads of unknown fragments and fragments that (transitively) spread themselves are
/// reported as [ClientError::Syntax].
pub fn inline_fragments(document: &Document) -> Result<Document, ClientError> {
    if document.fragments.is_empty() {
        return Ok(document.clone());
    }
    let fragments = document
        .fragments
        .iter()
        .map(|fragment| (fragment.name.as_str(), fragment))
        .collect::<BTreeMap<_, _>>();
    let mut visiting = Vec::new();
    let mut operations = Vec::with_capacity(document.operations.len());
    for op in document.operations.iter() {
        let mut op = op.clone();
        op.selection_set = inline_selection_set(&op.selection_set, &fragments, &mut visiting)?;
        operations.push(op);
    }
    Ok(Document {
        operations,
        fragments: Vec::new(),
    })
}

fn inline_selection_set(
    set: &SelectionSet,
    fragments: &BTreeMap<&str, &FragmentDefinition>,
    visiting: &mut Vec<String>,
) -> Result<SelectionSet, ClientError> {
    let mut items = Vec::with_capacity(set.items.len());
    for item in set.items.iter() {
        let inlined = match item {
            Selection::Field(field) => {
                let mut field = field.clone();
                if let Some(child) = &field.selection_set {
                    field.selection_set = Some(inline_selection_set(child, fragments, visiting)?);
                }
                Selection::Field(field)
            }
            Selection::InlineFragment(fragment) => Selection::InlineFragment(InlineFragment {
                type_condition: fragment.type_condition.clone(),
                directives: fragment.directives.clone(),
                selection_set: inline_selection_set(&fragment.selection_set, fragments, visiting)?,
            }),
            Selection::FragmentSpread(spread) => {
                let definition = fragments.get(spread.name.as_str()).ok_or_else(|| {
                    ClientError::Syntax(format!("Unknown fragment '{}'", spread.name))
                })?;
                if visiting.contains(&spread.name) {
                    visiting.push(spread.name.clone());
                    return Err(ClientError::Syntax(format!(
                        "Fragment cycle: {}",
                        visiting.join(" -> ")
                    )));
                }
                visiting.push(spread.name.clone());
                let selection_set =
                    inline_selection_set(&definition.selection_set, fragments, visiting)?;
                visiting.pop();
                let mut directives = definition.directives.clone();
                directives.extend(spread.directives.iter().cloned());
                Selection::InlineFragment(InlineFragment {
                    type_condition: Some(definition.type_condition.clone()),
                    directives,
                    selection_set,
                })
            }
        };
        items.push(inlined);
    }
    Ok(SelectionSet::new(items))
}

#[cfg(test)]
mod tests {
    use super::super::{parse, print};
    use super::*;
    use test_log::test;

    #[test]
    fn test_add_fields_reaches_every_selection_set() {
        let doc = parse("{ user { name pets { ... on Dog { barks } } } }").unwrap();
        let updated = add_fields(&doc, &["__typename"]);
        assert_eq!(
            print(&updated),
            "{\n  user {\n    name\n    pets {\n      ... on Dog {\n        barks\n        __typename\n      }\n      __typename\n    }\n    __typename\n  }\n  __typename\n}"
        );
        // The input is not modified
        assert!(!print(&doc).contains("__typename"));
    }

    #[test]
    fn test_add_fields_is_a_noop_when_present() {
        let doc = parse("{ user { __typename id name } }").unwrap();
        let updated = add_fields(&doc, &["__typename", "id"]);
        let Selection::Field(user) = &updated.operations[0].selection_set.items[0] else {
            panic!("expected a field");
        };
        assert_eq!(user.selection_set.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_remove_fields_deletes_subtrees_and_empty_parents() {
        let doc = parse("{ user { name secret { a b } } meta { secret } }").unwrap();
        let updated = remove_fields(&doc, &["secret"]);
        assert_eq!(print(&updated), "{\n  user {\n    name\n  }\n}");
    }

    #[test]
    fn test_inline_fragments_expands_spreads() {
        let doc = parse(
            "{ user { ...UserParts } } fragment UserParts on User { name ...Nested } fragment Nested on User { age @local }",
        )
        .unwrap();
        let inlined = inline_fragments(&doc).unwrap();
        assert!(inlined.fragments.is_empty());
        assert_eq!(
            print(&inlined),
            "{\n  user {\n    ... on User {\n      name\n      ... on User {\n        age @local\n      }\n    }\n  }\n}"
        );
    }

    #[test]
    fn test_inline_fragments_rejects_unknown_and_cyclic_fragments() {
        let unknown = parse("{ user { ...Missing } } fragment Other on User { id }").unwrap();
        assert!(matches!(
            inline_fragments(&unknown),
            Err(ClientError::Syntax(msg)) if msg.contains("Missing")
        ));

        let cyclic =
            parse("{ user { ...A } } fragment A on User { ...B } fragment B on User { ...A }")
                .unwrap();
        assert!(matches!(
            inline_fragments(&cyclic),
            Err(ClientError::Syntax(msg)) if msg.contains("cycle")
        ));
    }
}
