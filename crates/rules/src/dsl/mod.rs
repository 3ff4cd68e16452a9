//! Condition language: lexer, parser and expression tree.
//!
//! Conditions are compiled once per run. [`parse`] checks syntax only;
//! [`compile_for_scope`] also resolves every field against the scope's
//! catalogue.

mod ast;
mod error;
mod lexer;
mod parser;

pub use ast::{Call, CmpOp, Expr, Literal, Operand};
pub use error::{ParseError, ParseErrorKind};
pub use parser::{MAX_NESTING, MAX_TREE_DEPTH};

use crate::schema::Scope;

/// Parse condition text into an expression tree.
pub fn parse(text: &str) -> Result<Expr, ParseError> {
    parser::parse_condition(text)
}

/// Parse a condition and reject any field the scope does not define.
pub fn compile_for_scope(text: &str, scope: Scope) -> Result<Expr, ParseError> {
    let expr = parse(text)?;
    if let Some(field) = expr.fields().into_iter().find(|f| !scope.is_legal_field(f)) {
        let kind = ParseErrorKind::UnknownField(field.clone());
        return Err(match locate_word(text, &field) {
            Some(offset) => ParseError::at(kind, offset),
            None => ParseError::unlocated(kind),
        });
    }
    Ok(expr)
}

/// Byte offset of `word` as a whole identifier in `text`.
fn locate_word(text: &str, word: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    text.match_indices(word).map(|(i, _)| i).find(|&i| {
        let before = text[..i].chars().next_back();
        let after = text[i + word.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_reparses_to_the_same_tree() {
        let sources = [
            "Cases_Completed = 0 AND Shifts_Planned > 0",
            "NOT (a = 'x' OR b IS MISSING) AND c NOT IN NOCASE ('p', 2, TRUE)",
            "Minutes >= -2.5 OR CONSEC_BELOW(TargetAttain, 0.75, 3)",
            "FALSE OR REPEAT_CAUSE(2) AND DUPLICATE()",
            r#"Reason = "say \"hi\"""#,
            "a = 1 AND (b = 2 AND c = 3) OR NOT NOT d = 4",
            "ROLLING_COUNT(2, 4) AND NOT FORECAST_SHORTFALL(0.1)",
        ];
        for source in sources {
            let first = parse(source).unwrap();
            let rendered = first.to_string();
            let second = parse(&rendered).unwrap();
            assert_eq!(first, second, "re-parse of {rendered}");
            assert_eq!(rendered, second.to_string());
        }
    }

    #[test]
    fn display_keeps_flat_chains_flat() {
        let expr = parse("a = 1 AND b = 2 AND c = 3 OR d = 4").unwrap();
        assert_eq!(expr.to_string(), "a = 1 AND b = 2 AND c = 3 OR d = 4");

        let chain = vec!["a = 1"; MAX_TREE_DEPTH].join(" AND ");
        let expr = parse(&chain).unwrap();
        assert_eq!(parse(&expr.to_string()).unwrap(), expr);
    }

    #[test]
    fn parsing_is_deterministic() {
        let source = "Line IN ('Line 1', 'Line 2') AND NO_SCHEDULE()";
        assert_eq!(parse(source), parse(source));
    }

    #[test]
    fn compile_resolves_fields_against_scope() {
        assert!(compile_for_scope("Std_CPH IS MISSING", Scope::Standards).is_ok());

        let err = compile_for_scope("SKU = 'A' AND HourEndingDT IS MISSING", Scope::Standards)
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownField("HourEndingDT".into()));
        assert_eq!(err.offset, Some(14));
    }

    #[test]
    fn compile_dataset_scope_uses_statistics() {
        assert!(compile_for_scope("Hourly_Rows = 0", Scope::Dataset).is_ok());
        let err = compile_for_scope("Line = 'Line 1'", Scope::Dataset).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownField("Line".into()));
    }

    #[test]
    fn locate_word_skips_partial_matches() {
        assert_eq!(locate_word("SKU_Resolved = SKU", "SKU"), Some(15));
        assert_eq!(locate_word("Line = 1", "Lin"), None);
    }
}
