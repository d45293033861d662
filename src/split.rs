//! Splitting a query into the part the server sees and the part resolved locally.
//!
//! [split] walks a [Document] once. Each field is entered and left in depth-first order while
//! an explicit frame stack mirrors the walk, so the resulting [PathTree] never needs parent
//! pointers. On leave:
//!
//! - a field carrying the local directive is marked [LocalResolution::Pending] in the path tree
//!   and removed from the server tree;
//! - a field (or inline fragment) that had selections on entry but none on exit is removed,
//!   since an empty selection set is not valid query syntax.

use crate::{
    path_tree::{LocalResolution, PathNode, PathTree},
    query::{Document, Field, Selection, SelectionSet},
};

/// Output of [split].
#[derive(Debug, Clone, PartialEq)]
pub struct SplitQuery {
    /// The query with all local-only fields removed
    pub server_tree: Document,
    /// Where locally resolved values must be spliced into the server result
    pub path_tree: PathTree,
    pub found_local_field: bool,
    /// False when every root selection was local-only and nothing is left to ask the server
    pub send_to_server: bool,
}

/// Remove every field carrying `@{directive}` from `document` and record its location.
///
/// Named fragment definitions are cleaned too, but their fields are not reachable from a result
/// path; run [crate::query::inline_fragments] first when fragments may hold local fields.
pub fn split(document: &Document, directive: &str) -> SplitQuery {
    let mut server_tree = document.clone();
    let mut splitter = DirectiveSplitter::new(directive);

    let mut had_root_selections = false;
    let mut kept_root_selections = false;
    for op in server_tree.operations.iter_mut() {
        if !op.selection_set.is_empty() {
            had_root_selections = true;
        }
        splitter.visit_selection_set(&mut op.selection_set);
        if !op.selection_set.is_empty() {
            kept_root_selections = true;
        }
    }
    let path_tree = splitter.finish();

    let mut found_local_field = !path_tree.is_empty();
    for fragment in server_tree.fragments.iter_mut() {
        let mut fragment_splitter = DirectiveSplitter::new(directive);
        fragment_splitter.visit_selection_set(&mut fragment.selection_set);
        found_local_field |= !fragment_splitter.finish().is_empty();
    }

    let send_to_server = !had_root_selections || kept_root_selections;
    tracing::debug!(
        "[split] found_local_field: {}, send_to_server: {}",
        found_local_field,
        send_to_server
    );
    SplitQuery {
        server_tree,
        path_tree,
        found_local_field,
        send_to_server,
    }
}

/// One entry of the traversal stack: the field being visited and its path node under
/// construction.
struct Frame {
    key: String,
    node: PathNode,
    /// Selection set size when the field was entered
    start_len: usize,
}

struct DirectiveSplitter<'d> {
    directive: &'d str,
    stack: Vec<Frame>,
    root: PathTree,
}

impl<'d> DirectiveSplitter<'d> {
    fn new(directive: &'d str) -> Self {
        DirectiveSplitter {
            directive,
            stack: Vec::new(),
            root: PathTree::new(),
        }
    }

    fn finish(self) -> PathTree {
        debug_assert!(self.stack.is_empty());
        self.root
    }

    fn visit_selection_set(&mut self, set: &mut SelectionSet) {
        let items = std::mem::take(&mut set.items);
        for item in items {
            match item {
                Selection::Field(field) => {
                    if let Some(kept) = self.visit_field(field) {
                        set.items.push(Selection::Field(kept));
                    }
                }
                Selection::InlineFragment(mut fragment) => {
                    // Inline fragments are transparent for result paths
                    let start_len = fragment.selection_set.len();
                    self.visit_selection_set(&mut fragment.selection_set);
                    if start_len == 0 || !fragment.selection_set.is_empty() {
                        set.items.push(Selection::InlineFragment(fragment));
                    }
                }
                spread @ Selection::FragmentSpread(_) => set.items.push(spread),
            }
        }
    }

    fn visit_field(&mut self, mut field: Field) -> Option<Field> {
        self.enter(&field);
        if let Some(child) = field.selection_set.as_mut() {
            self.visit_selection_set(child);
        }
        self.leave(field)
    }

    fn enter(&mut self, field: &Field) {
        self.stack.push(Frame {
            key: field.response_key().to_string(),
            node: PathNode::new(&field.name),
            start_len: field.selection_set.as_ref().map_or(0, SelectionSet::len),
        });
    }

    fn leave(&mut self, field: Field) -> Option<Field> {
        let Some(frame) = self.stack.pop() else {
            tracing::error!("[split] left field '{}' without entering it", field.name);
            return Some(field);
        };
        let Frame {
            key,
            mut node,
            start_len,
        } = frame;

        let is_local = field.has_directive(self.directive);
        if is_local {
            // Local authority covers the whole subtree
            node.resolve_locally = Some(LocalResolution::Pending);
            node.children = PathTree::new();
        }
        self.parent_tree().insert(key, node);

        if is_local {
            return None;
        }
        let end_len = field.selection_set.as_ref().map_or(0, SelectionSet::len);
        if start_len > 0 && end_len == 0 {
            return None;
        }
        Some(field)
    }

    fn parent_tree(&mut self) -> &mut PathTree {
        match self.stack.last_mut() {
            Some(parent) => &mut parent.node.children,
            None => &mut self.root,
        }
    }
}
