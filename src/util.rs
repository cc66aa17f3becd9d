//! Small helpers for working with parse trees.

/// Renders `root` as a pseudographic tree, similar to the Unix `tree`
/// command.
///
/// `kids` must return a node's children in order and `show` its label.
/// The node handle `T` is expected to be a cheap copy, typically `&Node`.
pub fn pretty_tree<T, K, S>(root: T, kids: K, show: S) -> String
where
    T: Copy,
    K: Fn(T) -> Vec<T>,
    S: Fn(T) -> String,
{
    rec(root, "", "", &kids, &show)
}

const MID: &str = "|-- ";
const END: &str = "`-- ";
const CONT: &str = "|   ";
const LAST: &str = "    ";

fn rec<T, K, S>(node: T, indent: &str, sym: &str, kids: &K, show: &S) -> String
where
    T: Copy,
    K: Fn(T) -> Vec<T>,
    S: Fn(T) -> String,
{
    let line = format!("{}{}{}", indent, sym, show(node));
    let children = kids(node);
    if children.is_empty() {
        return line;
    }
    let next_indent = if sym == MID {
        format!("{}{}", indent, CONT)
    } else if sym.is_empty() {
        indent.to_string()
    } else {
        format!("{}{}", indent, LAST)
    };
    let mut lines = vec![line];
    let last = children.len() - 1;
    for (i, child) in children.into_iter().enumerate() {
        let sym = if i == last { END } else { MID };
        lines.push(rec(child, &next_indent, sym, kids, show));
    }
    lines.join("\n")
}
