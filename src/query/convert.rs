//! Conversion from the `async-graphql-parser` syntax tree into the owned [Document].

use async_graphql_parser::{
    parse_query,
    types::{self as gql, DocumentOperations, ExecutableDocument, OperationType},
    Positioned,
};
use std::fmt::Display;

use super::{
    Argument, Directive, Document, Field, FragmentDefinition, FragmentSpread, InlineFragment,
    OperationDefinition, OperationKind, Selection, SelectionSet, VariableDefinition,
};
use crate::error::ClientError;

pub(super) fn parse_text(text: &str) -> Result<Document, ClientError> {
    let parsed = parse_query(text)?;
    Ok(convert_document(parsed))
}

fn convert_document(doc: ExecutableDocument) -> Document {
    // Named operations and fragments come out of hash maps, sort them so printing is stable.
    let mut operations = match doc.operations {
        DocumentOperations::Single(op) => vec![convert_operation(None, op.node)],
        DocumentOperations::Multiple(ops) => ops
            .into_iter()
            .map(|(name, op)| convert_operation(Some(name.to_string()), op.node))
            .collect::<Vec<_>>(),
    };
    operations.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));

    let mut fragments = doc
        .fragments
        .into_iter()
        .map(|(name, fragment)| FragmentDefinition {
            name: name.to_string(),
            type_condition: fragment.node.type_condition.node.on.node.to_string(),
            directives: convert_directives(fragment.node.directives),
            selection_set: convert_selection_set(fragment.node.selection_set.node),
        })
        .collect::<Vec<_>>();
    fragments.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));

    Document {
        operations,
        fragments,
    }
}

fn convert_operation(name: Option<String>, op: gql::OperationDefinition) -> OperationDefinition {
    let kind = match op.ty {
        OperationType::Query => OperationKind::Query,
        OperationType::Mutation => OperationKind::Mutation,
        OperationType::Subscription => OperationKind::Subscription,
    };
    OperationDefinition {
        kind,
        name,
        variables: op
            .variable_definitions
            .into_iter()
            .map(|var| VariableDefinition {
                name: var.node.name.node.to_string(),
                var_type: var.node.var_type.node.to_string(),
                default_value: var.node.default_value.map(|value| value.node.to_string()),
                directives: convert_directives(var.node.directives),
            })
            .collect(),
        directives: convert_directives(op.directives),
        selection_set: convert_selection_set(op.selection_set.node),
    }
}

fn convert_selection_set(set: gql::SelectionSet) -> SelectionSet {
    SelectionSet::new(
        set.items
            .into_iter()
            .map(|item| convert_selection(item.node))
            .collect(),
    )
}

fn convert_selection(selection: gql::Selection) -> Selection {
    match selection {
        gql::Selection::Field(field) => {
            let field = field.node;
            let selection_set = convert_selection_set(field.selection_set.node);
            Selection::Field(Field {
                alias: field.alias.map(|alias| alias.node.to_string()),
                name: field.name.node.to_string(),
                arguments: convert_arguments(field.arguments),
                directives: convert_directives(field.directives),
                // The parser represents leaf fields with an empty selection set
                selection_set: (!selection_set.is_empty()).then_some(selection_set),
            })
        }
        gql::Selection::FragmentSpread(spread) => Selection::FragmentSpread(FragmentSpread {
            name: spread.node.fragment_name.node.to_string(),
            directives: convert_directives(spread.node.directives),
        }),
        gql::Selection::InlineFragment(fragment) => {
            let fragment = fragment.node;
            Selection::InlineFragment(InlineFragment {
                type_condition: fragment
                    .type_condition
                    .map(|condition| condition.node.on.node.to_string()),
                directives: convert_directives(fragment.directives),
                selection_set: convert_selection_set(fragment.selection_set.node),
            })
        }
    }
}

fn convert_directives(directives: Vec<Positioned<gql::Directive>>) -> Vec<Directive> {
    directives
        .into_iter()
        .map(|directive| Directive {
            name: directive.node.name.node.to_string(),
            arguments: convert_arguments(directive.node.arguments),
        })
        .collect()
}

fn convert_arguments<N: Display, V: Display>(
    arguments: Vec<(Positioned<N>, Positioned<V>)>,
) -> Vec<Argument> {
    arguments
        .into_iter()
        .map(|(name, value)| Argument {
            name: name.node.to_string(),
            value: value.node.to_string(),
        })
        .collect()
}
