use std::fmt::{self, Display, Formatter};

use super::{
    Argument, Directive, Document, Field, FragmentDefinition, OperationDefinition, Selection,
    SelectionSet,
};

const INDENT: &str = "  ";

impl Display for Document {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut first = true;
        for op in self.operations.iter() {
            if !first {
                f.write_str("\n\n")?;
            }
            first = false;
            write_operation(f, op)?;
        }
        for fragment in self.fragments.iter() {
            if !first {
                f.write_str("\n\n")?;
            }
            first = false;
            write_fragment(f, fragment)?;
        }
        Ok(())
    }
}

impl Display for SelectionSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write_selection_set(f, self, 0)
    }
}

fn write_operation(f: &mut Formatter, op: &OperationDefinition) -> fmt::Result {
    if !op.is_shorthand() {
        write!(f, "{}", op.kind)?;
        if let Some(name) = &op.name {
            write!(f, " {name}")?;
        }
        if !op.variables.is_empty() {
            f.write_str("(")?;
            for (idx, var) in op.variables.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "${}: {}", var.name, var.var_type)?;
                if let Some(default) = &var.default_value {
                    write!(f, " = {default}")?;
                }
                write_directives(f, &var.directives)?;
            }
            f.write_str(")")?;
        }
        write_directives(f, &op.directives)?;
        f.write_str(" ")?;
    }
    write_selection_set(f, &op.selection_set, 0)
}

fn write_fragment(f: &mut Formatter, fragment: &FragmentDefinition) -> fmt::Result {
    write!(f, "fragment {} on {}", fragment.name, fragment.type_condition)?;
    write_directives(f, &fragment.directives)?;
    f.write_str(" ")?;
    write_selection_set(f, &fragment.selection_set, 0)
}

fn write_selection_set(f: &mut Formatter, set: &SelectionSet, depth: usize) -> fmt::Result {
    if set.is_empty() {
        return f.write_str("{}");
    }
    f.write_str("{\n")?;
    for item in set.items.iter() {
        write_indent(f, depth + 1)?;
        match item {
            Selection::Field(field) => write_field(f, field, depth + 1)?,
            Selection::FragmentSpread(spread) => {
                write!(f, "...{}", spread.name)?;
                write_directives(f, &spread.directives)?;
            }
            Selection::InlineFragment(fragment) => {
                f.write_str("...")?;
                if let Some(type_condition) = &fragment.type_condition {
                    write!(f, " on {type_condition}")?;
                }
                write_directives(f, &fragment.directives)?;
                f.write_str(" ")?;
                write_selection_set(f, &fragment.selection_set, depth + 1)?;
            }
        }
        f.write_str("\n")?;
    }
    write_indent(f, depth)?;
    f.write_str("}")
}

fn write_field(f: &mut Formatter, field: &Field, depth: usize) -> fmt::Result {
    if let Some(alias) = &field.alias {
        write!(f, "{alias}: ")?;
    }
    f.write_str(&field.name)?;
    write_arguments(f, &field.arguments)?;
    write_directives(f, &field.directives)?;
    if let Some(set) = &field.selection_set {
        f.write_str(" ")?;
        write_selection_set(f, set, depth)?;
    }
    Ok(())
}

fn write_arguments(f: &mut Formatter, arguments: &[Argument]) -> fmt::Result {
    if arguments.is_empty() {
        return Ok(());
    }
    f.write_str("(")?;
    for (idx, argument) in arguments.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: {}", argument.name, argument.value)?;
    }
    f.write_str(")")
}

fn write_directives(f: &mut Formatter, directives: &[Directive]) -> fmt::Result {
    for directive in directives {
        write!(f, " @{}", directive.name)?;
        write_arguments(f, &directive.arguments)?;
    }
    Ok(())
}

fn write_indent(f: &mut Formatter, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}
