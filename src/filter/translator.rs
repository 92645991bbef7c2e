//! Push-down planning: rewriting a [`Filter`] into the native expressions a
//! partially capable backend can run.
//!
//! A backend implements [`FilterTranslator`] and overrides only the `create_*`
//! hooks it can express; every hook defaults to `None` ("cannot be pushed
//! down"). [`FilterTranslator::translate`] then:
//!
//! 1. unwraps chained layers
//! 2. pushes negations down to the leaves (De Morgan)
//! 3. simplifies the tree by simulating translation, dropping conjuncts that
//!    cannot be pushed down and distributing AND over an OR the backend cannot
//!    express
//! 4. produces the final expressions and removes exact duplicates
//!
//! The result reads as:
//!
//! - empty: nothing could be pushed down, fetch everything and filter in memory
//! - one element: a single native query
//! - several elements: run each query and union the results
//!
//! The returned expressions may match more than the filter does; callers still
//! evaluate the filter in memory against what the backend returns.

use std::{collections::HashSet, fmt, hash::Hash, rc::Rc};

use thiserror::Error;

use super::{Filter, Substring};
use crate::object::Attribute;

/// A translator whose hooks answered differently for the same input across
/// the simulation and translation passes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("Translator is inconsistent: {0}")]
    Inconsistent(String),
}

/// Backend capability hooks plus the push-down algorithm built on them.
///
/// Hooks must be deterministic: the same input has to produce the same
/// answer every time it is asked, or translation fails with
/// [`TranslateError::Inconsistent`].
pub trait FilterTranslator {
    /// One executable native query fragment.
    type Expr: Clone + Eq + Hash + fmt::Debug;

    fn create_and(&self, _lhs: &Self::Expr, _rhs: &Self::Expr) -> Option<Self::Expr> {
        None
    }

    fn create_or(&self, _lhs: &Self::Expr, _rhs: &Self::Expr) -> Option<Self::Expr> {
        None
    }

    fn create_presence(&self, _name: &str, _not: bool) -> Option<Self::Expr> {
        None
    }

    fn create_equals(&self, _attribute: &Attribute, _not: bool) -> Option<Self::Expr> {
        None
    }

    fn create_greater_than(&self, _attribute: &Attribute, _not: bool) -> Option<Self::Expr> {
        None
    }

    fn create_greater_than_or_equal(
        &self,
        _attribute: &Attribute,
        _not: bool,
    ) -> Option<Self::Expr> {
        None
    }

    fn create_less_than(&self, _attribute: &Attribute, _not: bool) -> Option<Self::Expr> {
        None
    }

    fn create_less_than_or_equal(&self, _attribute: &Attribute, _not: bool) -> Option<Self::Expr> {
        None
    }

    fn create_starts_with(&self, _leaf: &Substring, _not: bool) -> Option<Self::Expr> {
        None
    }

    fn create_ends_with(&self, _leaf: &Substring, _not: bool) -> Option<Self::Expr> {
        None
    }

    fn create_contains(&self, _leaf: &Substring, _not: bool) -> Option<Self::Expr> {
        None
    }

    fn create_contains_all(&self, _attribute: &Attribute, _not: bool) -> Option<Self::Expr> {
        None
    }

    /// Translate `filter` into native expressions. `None` (no filter) yields
    /// an empty list.
    fn translate<'a>(
        &self,
        filter: impl Into<Option<&'a Filter>>,
    ) -> Result<Vec<Self::Expr>, TranslateError> {
        translate(self, filter.into())
    }
}

/// Normalized filter tree: binary combinators over (possibly negated) leaves.
/// `Not` only survives on leaves. Subtrees are shared between simplification
/// attempts, never mutated.
#[derive(Debug)]
enum Node<'a> {
    And(Rc<Node<'a>>, Rc<Node<'a>>),
    Or(Rc<Node<'a>>, Rc<Node<'a>>),
    Leaf { filter: &'a Filter, not: bool },
}

fn translate<X>(translator: &X, filter: Option<&Filter>) -> Result<Vec<X::Expr>, TranslateError>
where
    X: FilterTranslator + ?Sized,
{
    let Some(filter) = filter else {
        return Ok(Vec::new());
    };

    let normalized = normalize(unchain(filter));
    let Some(simplified) = simplify(translator, &normalized)? else {
        tracing::debug!(%filter, "Filter cannot be pushed down");
        return Ok(Vec::new());
    };

    let expressions = translate_node(translator, &simplified)?;
    let mut seen = HashSet::with_capacity(expressions.len());
    let unique: Vec<X::Expr> = expressions
        .into_iter()
        .filter(|expression| seen.insert(expression.clone()))
        .collect();

    tracing::debug!(%filter, count = unique.len(), "Translated filter");
    Ok(unique)
}

fn unchain(mut filter: &Filter) -> &Filter {
    while let Filter::Chained(inner) = filter {
        filter = inner;
    }
    filter
}

fn normalize(filter: &Filter) -> Rc<Node<'_>> {
    let split = match filter {
        Filter::And(children) => children.split_first().map(|split| (split, Node::And as Combine)),
        Filter::Or(children) => children.split_first().map(|split| (split, Node::Or as Combine)),
        Filter::Not(inner) => return negate(&normalize(inner)),
        Filter::Chained(inner) => return normalize(inner),
        _ => None,
    };
    match split {
        Some(((first, rest), combine)) => normalize_all(first, rest, combine),
        // Empty combinators go to the hooks like leaves, and no hook can
        // express them.
        None => Rc::new(Node::Leaf { filter, not: false }),
    }
}

type Combine<'a> = fn(Rc<Node<'a>>, Rc<Node<'a>>) -> Node<'a>;

/// Right-nested binary fold: `[a, b, c]` becomes `a op (b op c)`.
fn normalize_all<'a>(first: &'a Filter, rest: &'a [Filter], combine: Combine<'a>) -> Rc<Node<'a>> {
    match rest.split_first() {
        None => normalize(first),
        Some((next, tail)) => Rc::new(combine(normalize(first), normalize_all(next, tail, combine))),
    }
}

fn negate<'a>(node: &Rc<Node<'a>>) -> Rc<Node<'a>> {
    Rc::new(match node.as_ref() {
        Node::And(lhs, rhs) => Node::Or(negate(lhs), negate(rhs)),
        Node::Or(lhs, rhs) => Node::And(negate(lhs), negate(rhs)),
        Node::Leaf { filter, not } => Node::Leaf {
            filter: *filter,
            not: !*not,
        },
    })
}

/// Reduce `node` to the part the translator can express.
///
/// `None` means "everything": nothing in this subtree narrows the result.
fn simplify<'a, X>(
    translator: &X,
    node: &Rc<Node<'a>>,
) -> Result<Option<Rc<Node<'a>>>, TranslateError>
where
    X: FilterTranslator + ?Sized,
{
    match node.as_ref() {
        Node::And(lhs, rhs) => {
            let Some(lhs) = simplify(translator, lhs)? else {
                tracing::trace!("Dropping left conjunct that cannot be pushed down");
                return simplify(translator, rhs);
            };
            let Some(rhs) = simplify(translator, rhs)? else {
                tracing::trace!("Dropping right conjunct that cannot be pushed down");
                return Ok(Some(lhs));
            };

            let lhs_exprs = translate_node(translator, &lhs)?;
            if lhs_exprs.is_empty() {
                return Err(inconsistent("left side of AND translated to nothing"));
            }
            let rhs_exprs = translate_node(translator, &rhs)?;
            if rhs_exprs.is_empty() {
                return Err(inconsistent("right side of AND translated to nothing"));
            }

            let and_possible = lhs_exprs.iter().any(|l| {
                rhs_exprs
                    .iter()
                    .any(|r| translator.create_and(l, r).is_some())
            });

            if !and_possible {
                // Keep the cheaper side; the other is left to in-memory filtering.
                return Ok(Some(if lhs_exprs.len() <= rhs_exprs.len() {
                    lhs
                } else {
                    rhs
                }));
            }

            if lhs_exprs.len() > 1 {
                let Node::Or(left, right) = lhs.as_ref() else {
                    return Err(inconsistent(format!(
                        "non-OR node produced {} expressions: {:?}",
                        lhs_exprs.len(),
                        lhs_exprs
                    )));
                };
                tracing::debug!("Distributing AND over an OR on the left");
                let distributed = Rc::new(Node::Or(
                    Rc::new(Node::And(left.clone(), rhs.clone())),
                    Rc::new(Node::And(right.clone(), rhs)),
                ));
                return simplify(translator, &distributed);
            }

            if rhs_exprs.len() > 1 {
                let Node::Or(left, right) = rhs.as_ref() else {
                    return Err(inconsistent(format!(
                        "non-OR node produced {} expressions: {:?}",
                        rhs_exprs.len(),
                        rhs_exprs
                    )));
                };
                tracing::debug!("Distributing AND over an OR on the right");
                let distributed = Rc::new(Node::Or(
                    Rc::new(Node::And(lhs.clone(), left.clone())),
                    Rc::new(Node::And(lhs, right.clone())),
                ));
                return simplify(translator, &distributed);
            }

            Ok(Some(Rc::new(Node::And(lhs, rhs))))
        }
        Node::Or(lhs, rhs) => {
            let Some(lhs) = simplify(translator, lhs)? else {
                return Ok(None);
            };
            let Some(rhs) = simplify(translator, rhs)? else {
                return Ok(None);
            };
            Ok(Some(Rc::new(Node::Or(lhs, rhs))))
        }
        Node::Leaf { filter, not } => {
            if leaf_expression(translator, filter, *not).is_some() {
                Ok(Some(node.clone()))
            } else {
                tracing::trace!(tag = filter.tag(), not, "Leaf cannot be pushed down");
                Ok(None)
            }
        }
    }
}

/// Translate an already simplified tree. Every leaf in it is expressible.
fn translate_node<X>(translator: &X, node: &Node<'_>) -> Result<Vec<X::Expr>, TranslateError>
where
    X: FilterTranslator + ?Sized,
{
    match node {
        Node::And(lhs, rhs) => {
            let lhs_exprs = translate_node(translator, lhs)?;
            let rhs_exprs = translate_node(translator, rhs)?;
            match (lhs_exprs.as_slice(), rhs_exprs.as_slice()) {
                ([l], [r]) => translator
                    .create_and(l, r)
                    .map(|expression| vec![expression])
                    .ok_or_else(|| inconsistent("create_and refused a pair it accepted before")),
                _ => Err(inconsistent(format!(
                    "AND sides must translate to one expression each, got {} and {}",
                    lhs_exprs.len(),
                    rhs_exprs.len()
                ))),
            }
        }
        Node::Or(lhs, rhs) => {
            let mut lhs_exprs = translate_node(translator, lhs)?;
            let rhs_exprs = translate_node(translator, rhs)?;
            if let ([l], [r]) = (lhs_exprs.as_slice(), rhs_exprs.as_slice())
                && let Some(expression) = translator.create_or(l, r)
            {
                return Ok(vec![expression]);
            }
            lhs_exprs.extend(rhs_exprs);
            Ok(lhs_exprs)
        }
        Node::Leaf { filter, not } => leaf_expression(translator, filter, *not)
            .map(|expression| vec![expression])
            .ok_or_else(|| inconsistent(format!("'{}' leaf refused after being accepted", filter.tag()))),
    }
}

fn leaf_expression<X>(translator: &X, filter: &Filter, not: bool) -> Option<X::Expr>
where
    X: FilterTranslator + ?Sized,
{
    match filter {
        Filter::Presence(name) => translator.create_presence(name, not),
        Filter::Equals(attribute) => translator.create_equals(attribute, not),
        Filter::GreaterThan(attribute) => translator.create_greater_than(attribute, not),
        Filter::GreaterThanOrEqual(attribute) => {
            translator.create_greater_than_or_equal(attribute, not)
        }
        Filter::LessThan(attribute) => translator.create_less_than(attribute, not),
        Filter::LessThanOrEqual(attribute) => translator.create_less_than_or_equal(attribute, not),
        Filter::StartsWith(leaf) => translator.create_starts_with(leaf, not),
        Filter::EndsWith(leaf) => translator.create_ends_with(leaf, not),
        Filter::Contains(leaf) => translator.create_contains(leaf, not),
        Filter::ContainsAll(attribute) => translator.create_contains_all(attribute, not),
        Filter::And(_) | Filter::Or(_) | Filter::Not(_) | Filter::Chained(_) => None,
    }
}

fn inconsistent(message: impl Into<String>) -> TranslateError {
    TranslateError::Inconsistent(message.into())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::object::Value;

    /// Renders leaves as `name=value` (`!name=value` when negated) for the
    /// attributes listed in `names`.
    struct Capabilities {
        and: bool,
        or: bool,
        names: &'static [&'static str],
    }

    impl Capabilities {
        fn leaf(&self, attribute: &Attribute, op: &str, not: bool) -> Option<String> {
            if !self.names.iter().any(|name| attribute.is(name)) {
                return None;
            }
            let value = attribute.values().first().map(Value::to_string).unwrap_or_default();
            Some(format!(
                "{}{}{}{}",
                if not { "!" } else { "" },
                attribute.name(),
                op,
                value
            ))
        }
    }

    impl FilterTranslator for Capabilities {
        type Expr = String;

        fn create_and(&self, lhs: &String, rhs: &String) -> Option<String> {
            self.and.then(|| format!("({}&{})", lhs, rhs))
        }

        fn create_or(&self, lhs: &String, rhs: &String) -> Option<String> {
            self.or.then(|| format!("({}|{})", lhs, rhs))
        }

        fn create_presence(&self, name: &str, not: bool) -> Option<String> {
            self.names
                .contains(&name)
                .then(|| format!("{}{}=*", if not { "!" } else { "" }, name))
        }

        fn create_equals(&self, attribute: &Attribute, not: bool) -> Option<String> {
            self.leaf(attribute, "=", not)
        }

        fn create_greater_than(&self, attribute: &Attribute, not: bool) -> Option<String> {
            self.leaf(attribute, ">", not)
        }

        fn create_less_than_or_equal(&self, attribute: &Attribute, not: bool) -> Option<String> {
            self.leaf(attribute, "<=", not)
        }

        fn create_starts_with(&self, leaf: &Substring, not: bool) -> Option<String> {
            self.leaf(&leaf.attribute, "^", not)
        }

        fn create_contains_all(&self, attribute: &Attribute, not: bool) -> Option<String> {
            self.leaf(attribute, "~", not)
        }
    }

    const FULL: Capabilities = Capabilities {
        and: true,
        or: true,
        names: &["a", "b", "c", "d"],
    };

    const NO_OR: Capabilities = Capabilities {
        and: true,
        or: false,
        names: &["a", "b", "c", "d"],
    };

    const LEAVES_ONLY: Capabilities = Capabilities {
        and: false,
        or: false,
        names: &["a", "b", "c", "d"],
    };

    fn eq(name: &str) -> Filter {
        Filter::equal(Attribute::build_with(name, ["1"]).unwrap())
    }

    #[test]
    fn test_no_filter() {
        assert!(FULL.translate(None::<&Filter>).unwrap().is_empty());
    }

    #[test]
    fn test_single_leaf() {
        assert_eq!(FULL.translate(&eq("a")).unwrap(), vec!["a=1"]);
        assert!(FULL.translate(&eq("x")).unwrap().is_empty());
    }

    #[test]
    fn test_full_support_single_expression() {
        let filter = Filter::and(eq("a"), Filter::or(eq("b"), eq("c")));
        assert_eq!(FULL.translate(&filter).unwrap(), vec!["(a=1&(b=1|c=1))"]);
    }

    #[test]
    fn test_distributes_and_over_unsupported_or() {
        let filter = Filter::and(Filter::or(eq("a"), eq("b")), eq("c"));
        assert_eq!(
            NO_OR.translate(&filter).unwrap(),
            vec!["(a=1&c=1)", "(b=1&c=1)"]
        );
    }

    #[test]
    fn test_distributes_on_right() {
        let filter = Filter::and(eq("a"), Filter::or(eq("b"), eq("c")));
        assert_eq!(
            NO_OR.translate(&filter).unwrap(),
            vec!["(a=1&b=1)", "(a=1&c=1)"]
        );
    }

    #[test]
    fn test_without_and_keeps_cheaper_side() {
        let filter = Filter::and(eq("a"), Filter::or(eq("b"), eq("c")));
        assert_eq!(LEAVES_ONLY.translate(&filter).unwrap(), vec!["a=1"]);

        let filter = Filter::and(Filter::or(eq("b"), eq("c")), eq("a"));
        assert_eq!(LEAVES_ONLY.translate(&filter).unwrap(), vec!["a=1"]);
    }

    #[test]
    fn test_without_and_keeps_left_on_tie() {
        let filter = Filter::and(eq("a"), eq("b"));
        assert_eq!(LEAVES_ONLY.translate(&filter).unwrap(), vec!["a=1"]);
    }

    #[test]
    fn test_unsupported_conjunct_dropped() {
        let filter = Filter::and(eq("x"), eq("a"));
        assert_eq!(FULL.translate(&filter).unwrap(), vec!["a=1"]);

        let filter = Filter::And(vec![eq("a"), eq("x"), eq("b")]);
        assert_eq!(FULL.translate(&filter).unwrap(), vec!["(a=1&b=1)"]);
    }

    #[test]
    fn test_unsupported_disjunct_is_everything() {
        let filter = Filter::or(eq("a"), eq("x"));
        assert!(FULL.translate(&filter).unwrap().is_empty());

        let filter = Filter::and(eq("b"), Filter::or(eq("a"), eq("x")));
        assert_eq!(FULL.translate(&filter).unwrap(), vec!["b=1"]);
    }

    #[test]
    fn test_or_without_native_or_concatenates() {
        let filter = Filter::Or(vec![eq("a"), eq("b"), eq("c")]);
        assert_eq!(
            LEAVES_ONLY.translate(&filter).unwrap(),
            vec!["a=1", "b=1", "c=1"]
        );
    }

    #[test]
    fn test_not_pushed_to_leaves() {
        let filter = Filter::not(Filter::and(eq("a"), eq("b")));
        assert_eq!(FULL.translate(&filter).unwrap(), vec!["(!a=1|!b=1)"]);

        let filter = Filter::not(Filter::or(eq("a"), Filter::presence("b")));
        assert_eq!(FULL.translate(&filter).unwrap(), vec!["(!a=1&!b=*)"]);
    }

    #[test]
    fn test_double_negation() {
        let filter = Filter::not(Filter::not(eq("a")));
        assert_eq!(FULL.translate(&filter).unwrap(), vec!["a=1"]);
    }

    #[test]
    fn test_chained_layers_unwrapped() {
        let filter = Filter::chained(Filter::chained(Filter::and(
            Filter::chained(eq("a")),
            Filter::not(Filter::chained(eq("b"))),
        )));
        assert_eq!(FULL.translate(&filter).unwrap(), vec!["(a=1&!b=1)"]);
    }

    #[test]
    fn test_duplicates_removed() {
        let filter = Filter::or(eq("a"), eq("a"));
        assert_eq!(LEAVES_ONLY.translate(&filter).unwrap(), vec!["a=1"]);

        let filter = Filter::and(Filter::or(eq("a"), eq("b")), Filter::or(eq("a"), eq("b")));
        let expressions = NO_OR.translate(&filter).unwrap();
        let unique: HashSet<&String> = expressions.iter().collect();
        assert_eq!(unique.len(), expressions.len());
        assert_eq!(
            expressions,
            vec!["(a=1&a=1)", "(a=1&b=1)", "(b=1&a=1)", "(b=1&b=1)"]
        );
    }

    #[test]
    fn test_empty_combinators_are_everything() {
        assert!(FULL.translate(&Filter::And(Vec::new())).unwrap().is_empty());
        assert!(FULL.translate(&Filter::Or(Vec::new())).unwrap().is_empty());
        assert_eq!(
            FULL.translate(&Filter::and(Filter::Or(Vec::new()), eq("a"))).unwrap(),
            vec!["a=1"]
        );
    }

    #[test]
    fn test_default_hooks_push_nothing() {
        struct Nothing;
        impl FilterTranslator for Nothing {
            type Expr = u8;
        }

        let filter = Filter::and(eq("a"), Filter::presence("b"));
        assert!(Nothing.translate(&filter).unwrap().is_empty());
    }

    #[test]
    fn test_contains_all_and_less_or_equal_leaves() {
        let members = Filter::contains_all(Attribute::build_with("d", ["x", "y"]).unwrap());
        let limit = Filter::less_than_or_equal(Attribute::build_with("c", [5_i64]).unwrap());
        assert_eq!(FULL.translate(&members).unwrap(), vec!["d~x"]);
        assert_eq!(FULL.translate(&limit).unwrap(), vec!["c<=5"]);

        let filter = Filter::not(Filter::and(members, limit));
        assert_eq!(FULL.translate(&filter).unwrap(), vec!["(!d~x|!c<=5)"]);
        assert_eq!(NO_OR.translate(&filter).unwrap(), vec!["!d~x", "!c<=5"]);
    }

    #[test]
    fn test_simplified_form_translates_the_same() {
        let filter = Filter::and(Filter::or(eq("a"), eq("b")), eq("c"));
        let simplified = Filter::or(
            Filter::and(eq("a"), eq("c")),
            Filter::and(eq("b"), eq("c")),
        );
        let first = NO_OR.translate(&filter).unwrap();
        assert_eq!(first, vec!["(a=1&c=1)", "(b=1&c=1)"]);
        assert_eq!(NO_OR.translate(&simplified).unwrap(), first);
    }

    #[test]
    fn test_repeated_translation_stable() {
        let filter = Filter::and(
            Filter::or(eq("a"), Filter::starts_with(Attribute::build_with("b", ["x"]).unwrap(), false)),
            Filter::not(Filter::greater_than(Attribute::build_with("c", [5_i64]).unwrap())),
        );
        let first = NO_OR.translate(&filter).unwrap();
        let second = NO_OR.translate(&filter).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec!["(a=1&!c>5)", "(b^x&!c>5)"]);
    }

    struct Flaky {
        calls: Cell<usize>,
    }

    impl FilterTranslator for Flaky {
        type Expr = String;

        fn create_and(&self, lhs: &String, rhs: &String) -> Option<String> {
            let calls = self.calls.get() + 1;
            self.calls.set(calls);
            (calls == 1).then(|| format!("({}&{})", lhs, rhs))
        }

        fn create_equals(&self, attribute: &Attribute, _not: bool) -> Option<String> {
            Some(attribute.name().to_string())
        }
    }

    #[test]
    fn test_inconsistent_translator_detected() {
        let translator = Flaky {
            calls: Cell::new(0),
        };
        let err = translator
            .translate(&Filter::and(eq("a"), eq("b")))
            .unwrap_err();
        assert!(matches!(err, TranslateError::Inconsistent(_)));
    }
}
