//! The structural type model: parsing type runes, assignability, and
//! unification.
//!
//! Ported from the reference implementation's `types.cpp` assignability
//! and unification walk, expressed here as a tagged `Type` value rather
//! than a class hierarchy.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Unknown,
    Whole,
    Truth,
    Phrase,
    Void,
    Any,
    Order,
    Tome,
    Spell,
}

/// A structural type value: a kind plus its parameters.
/// `Order[T]` carries one parameter; `Tome[K,V]` carries two; `Spell`
/// carries argument types followed by the return type (so `params.len()`
/// is arity + 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub kind: TypeKind,
    pub params: Vec<Type>,
}

impl Type {
    pub fn simple(kind: TypeKind) -> Type {
        Type { kind, params: Vec::new() }
    }

    pub fn unknown() -> Type {
        Type::simple(TypeKind::Unknown)
    }
    pub fn whole() -> Type {
        Type::simple(TypeKind::Whole)
    }
    pub fn truth() -> Type {
        Type::simple(TypeKind::Truth)
    }
    pub fn phrase() -> Type {
        Type::simple(TypeKind::Phrase)
    }
    pub fn void() -> Type {
        Type::simple(TypeKind::Void)
    }
    pub fn any() -> Type {
        Type::simple(TypeKind::Any)
    }

    pub fn order(element: Type) -> Type {
        Type { kind: TypeKind::Order, params: vec![element] }
    }
    pub fn tome(key: Type, value: Type) -> Type {
        Type { kind: TypeKind::Tome, params: vec![key, value] }
    }
    /// `args` followed internally by `ret`; arity is `args.len()`.
    pub fn spell(args: Vec<Type>, ret: Type) -> Type {
        let mut params = args;
        params.push(ret);
        Type { kind: TypeKind::Spell, params }
    }

    pub fn order_element(&self) -> &Type {
        &self.params[0]
    }
    pub fn tome_key(&self) -> &Type {
        &self.params[0]
    }
    pub fn tome_value(&self) -> &Type {
        &self.params[1]
    }
    pub fn spell_arity(&self) -> usize {
        self.params.len().saturating_sub(1)
    }
    pub fn spell_args(&self) -> &[Type] {
        &self.params[..self.params.len() - 1]
    }
    pub fn spell_return(&self) -> &Type {
        &self.params[self.params.len() - 1]
    }

    /// Case-insensitive parse of a type rune: bare words map to simple
    /// types, angle-bracketed forms parse parameters recursively.
    /// `order` without a parameter is `Order[Unknown]`; `tome` without
    /// parameters is `Tome[Unknown,Unknown]`.
    pub fn parse_rune(rune: &str) -> Option<Type> {
        let rune = rune.trim();
        let lower = rune.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("order") {
            return Self::parse_order_rune(rest, rune);
        }
        if let Some(rest) = lower.strip_prefix("tome") {
            return Self::parse_tome_rune(rest, rune);
        }
        match lower.as_str() {
            "whole" => Some(Type::whole()),
            "truth" => Some(Type::truth()),
            "phrase" => Some(Type::phrase()),
            "void" => Some(Type::void()),
            "any" => Some(Type::any()),
            "unknown" => Some(Type::unknown()),
            _ => None,
        }
    }

    fn parse_order_rune(rest_lower: &str, original: &str) -> Option<Type> {
        let rest = rest_lower.trim();
        if rest.is_empty() {
            return Some(Type::order(Type::unknown()));
        }
        let orig_tail = &original[original.len() - rest.len()..];
        let inner = strip_brackets(orig_tail)?;
        Some(Type::order(Type::parse_rune(inner)?))
    }

    fn parse_tome_rune(rest_lower: &str, original: &str) -> Option<Type> {
        let rest = rest_lower.trim();
        if rest.is_empty() {
            return Some(Type::tome(Type::phrase(), Type::unknown()));
        }
        let orig_tail = &original[original.len() - rest.len()..];
        let inner = strip_brackets(orig_tail)?;
        let parts = split_top_level_comma(inner);
        match parts.len() {
            1 => Some(Type::tome(Type::phrase(), Type::parse_rune(parts[0])?)),
            2 => Some(Type::tome(Type::parse_rune(parts[0])?, Type::parse_rune(parts[1])?)),
            _ => None,
        }
    }
}

fn strip_brackets(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.starts_with('[') && s.ends_with(']') {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn split_top_level_comma(s: &str) -> Vec<&str> {
    let mut depth = 0i32;
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TypeKind::Unknown => write!(f, "unknown"),
            TypeKind::Whole => write!(f, "whole"),
            TypeKind::Truth => write!(f, "truth"),
            TypeKind::Phrase => write!(f, "phrase"),
            TypeKind::Void => write!(f, "void"),
            TypeKind::Any => write!(f, "any"),
            TypeKind::Order => write!(f, "order[{}]", self.order_element()),
            TypeKind::Tome => write!(f, "tome[{},{}]", self.tome_key(), self.tome_value()),
            TypeKind::Spell => {
                write!(f, "spell(")?;
                for (i, a) in self.spell_args().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ") returning {}", self.spell_return())
            }
        }
    }
}

/// `target <- source`: is a value of `source` assignable to a location of
/// type `target`?
pub fn is_assignable_from(target: &Type, source: &Type) -> bool {
    if target.kind == TypeKind::Unknown || target.kind == TypeKind::Any {
        return true;
    }
    if source.kind == TypeKind::Unknown || source.kind == TypeKind::Any {
        return true;
    }
    if target.kind != source.kind {
        return false;
    }
    match target.kind {
        TypeKind::Order => {
            target.order_element().kind == TypeKind::Unknown
                || is_assignable_from(target.order_element(), source.order_element())
        }
        TypeKind::Tome => {
            is_assignable_from(target.tome_key(), source.tome_key())
                && is_assignable_from(target.tome_value(), source.tome_value())
        }
        TypeKind::Spell => {
            if target.spell_arity() != source.spell_arity() {
                return false;
            }
            // contravariant arguments: target's param must accept being fed by source's param
            let args_ok = target
                .spell_args()
                .iter()
                .zip(source.spell_args())
                .all(|(t, s)| is_assignable_from(s, t));
            // covariant return
            args_ok && is_assignable_from(target.spell_return(), source.spell_return())
        }
        _ => true,
    }
}

/// `unify(a, b) = unify(b, a)`: the most specific common type, or `None`
/// if the kinds are incompatible.
pub fn unify(a: &Type, b: &Type) -> Option<Type> {
    if a == b {
        return Some(a.clone());
    }
    if a.kind == TypeKind::Unknown {
        return Some(b.clone());
    }
    if b.kind == TypeKind::Unknown {
        return Some(a.clone());
    }
    if a.kind == TypeKind::Any || b.kind == TypeKind::Any {
        return Some(Type::any());
    }
    if a.kind != b.kind {
        return None;
    }
    match a.kind {
        TypeKind::Order => Some(Type::order(unify(a.order_element(), b.order_element())?)),
        TypeKind::Tome => Some(Type::tome(
            unify(a.tome_key(), b.tome_key())?,
            unify(a.tome_value(), b.tome_value())?,
        )),
        _ => Some(a.clone()),
    }
}

/// Unify a sequence of types left-to-right; empty sequences unify to
/// `Unknown` (no elements to constrain the type).
pub fn unify_all<'a>(types: impl IntoIterator<Item = &'a Type>) -> Type {
    let mut iter = types.into_iter();
    let first = match iter.next() {
        Some(t) => t.clone(),
        None => return Type::unknown(),
    };
    iter.fold(first, |acc, t| unify(&acc, t).unwrap_or_else(Type::any))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_runes_case_insensitively() {
        assert_eq!(Type::parse_rune("Whole"), Some(Type::whole()));
        assert_eq!(Type::parse_rune("TRUTH"), Some(Type::truth()));
    }

    #[test]
    fn parses_bare_order_and_tome_as_unknown_parameterized() {
        assert_eq!(Type::parse_rune("order"), Some(Type::order(Type::unknown())));
        assert_eq!(Type::parse_rune("tome"), Some(Type::tome(Type::phrase(), Type::unknown())));
    }

    #[test]
    fn parses_parameterized_order_and_tome() {
        assert_eq!(Type::parse_rune("order[whole]"), Some(Type::order(Type::whole())));
        assert_eq!(
            Type::parse_rune("tome[phrase,whole]"),
            Some(Type::tome(Type::phrase(), Type::whole()))
        );
    }

    #[test]
    fn unknown_and_any_are_universally_assignable() {
        let whole = Type::whole();
        assert!(is_assignable_from(&Type::unknown(), &whole));
        assert!(is_assignable_from(&whole, &Type::unknown()));
        assert!(is_assignable_from(&Type::any(), &whole));
        assert!(is_assignable_from(&whole, &Type::any()));
    }

    #[test]
    fn assignable_from_is_reflexive() {
        for t in [Type::whole(), Type::truth(), Type::phrase(), Type::order(Type::whole())] {
            assert!(is_assignable_from(&t, &t));
        }
    }

    #[test]
    fn order_assignability_is_invariant_on_element_unless_unknown() {
        let order_whole = Type::order(Type::whole());
        let order_truth = Type::order(Type::truth());
        assert!(!is_assignable_from(&order_whole, &order_truth));
        let order_unknown = Type::order(Type::unknown());
        assert!(is_assignable_from(&order_unknown, &order_truth));
    }

    #[test]
    fn spell_assignability_is_contravariant_args_covariant_return() {
        // target: (any) -> whole ; source: (whole) -> whole
        let target = Type::spell(vec![Type::any()], Type::whole());
        let source = Type::spell(vec![Type::whole()], Type::whole());
        assert!(is_assignable_from(&target, &source));
    }

    #[test]
    fn unify_is_symmetric() {
        let a = Type::whole();
        let b = Type::unknown();
        assert_eq!(unify(&a, &b), unify(&b, &a));
        let c = Type::order(Type::whole());
        let d = Type::order(Type::unknown());
        assert_eq!(unify(&c, &d), unify(&d, &c));
    }

    #[test]
    fn unify_mismatched_kinds_is_none() {
        assert_eq!(unify(&Type::whole(), &Type::truth()), None);
    }
}
