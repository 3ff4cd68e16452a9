//! Recursive-descent parser: tokens to [`Expr`].
//!
//! Precedence, loosest first: `OR`, `AND`, `NOT`, predicates.
//!
//! Both the parser's own recursion (parentheses and `NOT`) and the depth of
//! the resulting tree are capped, so a pathological condition becomes a
//! parse error instead of exhausting the stack later.

use super::ast::{Call, Expr, Literal, Operand};
use super::error::{ParseError, ParseErrorKind};
use super::lexer::{tokenize, Token, TokenKind};

pub(crate) fn parse_condition(input: &str) -> Result<Expr, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::unlocated(ParseErrorKind::Empty));
    }
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };
    let (expr, _) = parser.parse_or()?;

    let trailing = parser.peek();
    match trailing.kind {
        TokenKind::Eof => Ok(expr),
        TokenKind::RParen => Err(ParseError::at(
            ParseErrorKind::UnbalancedGrouping,
            trailing.offset,
        )),
        _ => Err(parser.unexpected()),
    }
}

/// Deepest `(`/`NOT` nesting accepted.
pub const MAX_NESTING: usize = 64;

/// Deepest expression tree accepted, counting every `AND`, `OR` and `NOT` node.
pub const MAX_TREE_DEPTH: usize = 128;

/// Parse result with the depth of its tree (a predicate is depth 1).
type Parsed = (Expr, usize);

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open `(` and `NOT` levels on the current descent.
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_next_kind(&self) -> &TokenKind {
        let idx = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> ParseError {
        let token = self.peek();
        match &token.kind {
            TokenKind::Eof => ParseError::at(ParseErrorKind::UnexpectedEnd, token.offset),
            other => ParseError::at(
                ParseErrorKind::UnexpectedToken(other.to_string()),
                token.offset,
            ),
        }
    }

    fn expect_close(&mut self, open_offset: usize) -> Result<(), ParseError> {
        match self.peek_kind() {
            TokenKind::RParen => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Err(ParseError::at(
                ParseErrorKind::UnbalancedGrouping,
                open_offset,
            )),
            _ => Err(self.unexpected()),
        }
    }

    fn too_deep(offset: usize, limit: usize) -> ParseError {
        ParseError::at(ParseErrorKind::TooDeep { limit }, offset)
    }

    /// Enter one `(` or `NOT` level opened at `offset`.
    fn descend(&mut self, offset: usize) -> Result<(), ParseError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(Self::too_deep(offset, MAX_NESTING));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.nesting -= 1;
    }

    /// Depth of a new node over children of depth `child`.
    fn node_depth(&self, child: usize, offset: usize) -> Result<usize, ParseError> {
        let depth = child + 1;
        if depth > MAX_TREE_DEPTH {
            return Err(Self::too_deep(offset, MAX_TREE_DEPTH));
        }
        Ok(depth)
    }

    fn parse_or(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut depth) = self.parse_and()?;
        while self.peek_kind() == &TokenKind::Or {
            let op = self.advance();
            let (right, right_depth) = self.parse_and()?;
            depth = self.node_depth(depth.max(right_depth), op.offset)?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok((left, depth))
    }

    fn parse_and(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut depth) = self.parse_not()?;
        while self.peek_kind() == &TokenKind::And {
            let op = self.advance();
            let (right, right_depth) = self.parse_not()?;
            depth = self.node_depth(depth.max(right_depth), op.offset)?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok((left, depth))
    }

    fn parse_not(&mut self) -> Result<Parsed, ParseError> {
        if self.peek_kind() == &TokenKind::Not {
            let op = self.advance();
            self.descend(op.offset)?;
            let (inner, inner_depth) = self.parse_not()?;
            self.ascend();
            let depth = self.node_depth(inner_depth, op.offset)?;
            return Ok((Expr::Not(Box::new(inner)), depth));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Parsed, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::LParen => {
                let open = self.advance();
                self.descend(open.offset)?;
                let inner = self.parse_or()?;
                self.expect_close(open.offset)?;
                self.ascend();
                Ok(inner)
            }
            TokenKind::Ident(name) if *self.peek_next_kind() == TokenKind::LParen => {
                let token = self.advance();
                self.advance();
                let call = self.parse_call(&name, token.offset)?;
                Ok((Expr::Call(call), 1))
            }
            TokenKind::True | TokenKind::False if !self.next_starts_predicate_tail() => {
                let token = self.advance();
                Ok((Expr::Constant(token.kind == TokenKind::True), 1))
            }
            _ => {
                let operand = self.parse_operand()?;
                Ok((self.parse_predicate_tail(operand)?, 1))
            }
        }
    }

    /// Whether the token after the current one continues a predicate, i.e.
    /// the current token is the left operand rather than a bare constant.
    fn next_starts_predicate_tail(&self) -> bool {
        matches!(
            self.peek_next_kind(),
            TokenKind::Cmp(_) | TokenKind::Is | TokenKind::In | TokenKind::Not
        )
    }

    fn parse_predicate_tail(&mut self, operand: Operand) -> Result<Expr, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Cmp(op) => {
                self.advance();
                let right = self.parse_operand()?;
                Ok(Expr::Compare {
                    left: operand,
                    op,
                    right,
                })
            }
            TokenKind::Is => {
                self.advance();
                let negated = self.eat(&TokenKind::Not);
                if !self.eat(&TokenKind::Missing) {
                    return Err(self.unexpected());
                }
                Ok(Expr::IsMissing { operand, negated })
            }
            TokenKind::Not if *self.peek_next_kind() == TokenKind::In => {
                self.advance();
                self.advance();
                self.parse_in_set(operand, true)
            }
            TokenKind::In => {
                self.advance();
                self.parse_in_set(operand, false)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_in_set(&mut self, operand: Operand, negated: bool) -> Result<Expr, ParseError> {
        let case_insensitive = self.eat(&TokenKind::Nocase);
        let open = self.peek().clone();
        if open.kind != TokenKind::LParen {
            return Err(self.unexpected());
        }
        self.advance();

        let mut set = vec![self.parse_literal()?];
        while self.eat(&TokenKind::Comma) {
            set.push(self.parse_literal()?);
        }
        self.expect_close(open.offset)?;

        Ok(Expr::InSet {
            operand,
            set,
            negated,
            case_insensitive,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        if let TokenKind::Ident(name) = self.peek_kind().clone() {
            self.advance();
            return Ok(Operand::Field(name));
        }
        self.parse_literal().map(Operand::Literal)
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Literal::Number(n))
            }
            TokenKind::Minus => {
                self.advance();
                match self.peek_kind().clone() {
                    TokenKind::Number(n) => {
                        self.advance();
                        Ok(Literal::Number(-n))
                    }
                    _ => Err(self.unexpected()),
                }
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Literal::Text(s))
            }
            TokenKind::True => {
                self.advance();
                Ok(Literal::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Literal::Bool(false))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Parse the argument list of a built-in; the opening parenthesis is consumed.
    fn parse_call(&mut self, name: &str, offset: usize) -> Result<Call, ParseError> {
        let mut args = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                args.push(self.parse_operand()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect_close(offset)?;
                break;
            }
        }
        build_call(name, &args).map_err(|kind| ParseError::at(kind, offset))
    }
}

fn build_call(name: &str, args: &[Operand]) -> Result<Call, ParseErrorKind> {
    let upper = name.to_ascii_uppercase();
    let no_args = |call: Call, function: &'static str| {
        if args.is_empty() {
            Ok(call)
        } else {
            Err(ParseErrorKind::InvalidArguments {
                function,
                expected: "no arguments",
            })
        }
    };

    match upper.as_str() {
        "NO_STANDARD" => no_args(Call::NoStandard, "NO_STANDARD"),
        "NO_SCHEDULE" => no_args(Call::NoSchedule, "NO_SCHEDULE"),
        "DUPLICATE" => no_args(Call::Duplicate, "DUPLICATE"),
        "SCHEDULE_OVERLAP" => no_args(Call::ScheduleOverlap, "SCHEDULE_OVERLAP"),
        "REPEAT_CAUSE" => match args {
            [Operand::Literal(Literal::Number(n))] if is_count(*n) => {
                Ok(Call::RepeatCause { min: *n as usize })
            }
            _ => Err(ParseErrorKind::InvalidArguments {
                function: "REPEAT_CAUSE",
                expected: "one positive whole number",
            }),
        },
        "CONSEC_BELOW" => match args {
            [Operand::Field(field), Operand::Literal(Literal::Number(threshold)), Operand::Literal(Literal::Number(hours))]
                if is_count(*hours) =>
            {
                Ok(Call::ConsecBelow {
                    field: field.clone(),
                    threshold: *threshold,
                    hours: *hours as usize,
                })
            }
            _ => Err(ParseErrorKind::InvalidArguments {
                function: "CONSEC_BELOW",
                expected: "(field, threshold, consecutive rows)",
            }),
        },
        "ROLLING_COUNT" => match args {
            [Operand::Literal(Literal::Number(window)), Operand::Literal(Literal::Number(min))]
                if is_count(*window) && is_count(*min) =>
            {
                Ok(Call::RollingCount {
                    window_hours: *window as u32,
                    min: *min as usize,
                })
            }
            _ => Err(ParseErrorKind::InvalidArguments {
                function: "ROLLING_COUNT",
                expected: "(window hours, minimum stops) as positive whole numbers",
            }),
        },
        "FORECAST_SHORTFALL" => match args {
            [Operand::Literal(Literal::Number(pct))] if pct.is_finite() && *pct >= 0.0 => {
                Ok(Call::ForecastShortfall { pct: *pct })
            }
            _ => Err(ParseErrorKind::InvalidArguments {
                function: "FORECAST_SHORTFALL",
                expected: "one non-negative shortfall fraction",
            }),
        },
        _ => Err(ParseErrorKind::UnknownFunction(name.to_string())),
    }
}

fn is_count(n: f64) -> bool {
    n >= 1.0 && n.fract() == 0.0 && n <= u32::MAX as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::ast::CmpOp;

    fn field(name: &str) -> Operand {
        Operand::Field(name.to_string())
    }

    fn num(n: f64) -> Operand {
        Operand::Literal(Literal::Number(n))
    }

    #[test]
    fn parses_comparison_chain_with_precedence() {
        let expr = parse_condition("Cases_Completed = 0 AND Shifts_Planned > 0 OR NOT Line = 'Line 2'")
            .unwrap();
        let expected = Expr::Or(
            Box::new(Expr::And(
                Box::new(Expr::Compare {
                    left: field("Cases_Completed"),
                    op: CmpOp::Eq,
                    right: num(0.0),
                }),
                Box::new(Expr::Compare {
                    left: field("Shifts_Planned"),
                    op: CmpOp::Gt,
                    right: num(0.0),
                }),
            )),
            Box::new(Expr::Not(Box::new(Expr::Compare {
                left: field("Line"),
                op: CmpOp::Eq,
                right: Operand::Literal(Literal::Text("Line 2".into())),
            }))),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn parentheses_override_precedence() {
        let expr = parse_condition("a = 1 AND (b = 2 OR c = 3)").unwrap();
        assert!(matches!(expr, Expr::And(_, ref rhs) if matches!(**rhs, Expr::Or(_, _))));
    }

    #[test]
    fn parses_membership_and_missing_predicates() {
        let expr = parse_condition("Cause not in nocase ('jam', \"Starved\") AND SKU IS NOT BLANK")
            .unwrap();
        match expr {
            Expr::And(lhs, rhs) => {
                assert_eq!(
                    *lhs,
                    Expr::InSet {
                        operand: field("Cause"),
                        set: vec![
                            Literal::Text("jam".into()),
                            Literal::Text("Starved".into())
                        ],
                        negated: true,
                        case_insensitive: true,
                    }
                );
                assert_eq!(
                    *rhs,
                    Expr::IsMissing {
                        operand: field("SKU"),
                        negated: true
                    }
                );
            }
            other => panic!("expected AND, got {other:?}"),
        }
    }

    #[test]
    fn parses_builtin_calls_with_typed_arguments() {
        assert_eq!(parse_condition("NO_STANDARD()").unwrap(), Expr::Call(Call::NoStandard));
        assert_eq!(
            parse_condition("repeat_cause(3)").unwrap(),
            Expr::Call(Call::RepeatCause { min: 3 })
        );
        assert_eq!(
            parse_condition("CONSEC_BELOW(TargetAttain, 0.7, 2)").unwrap(),
            Expr::Call(Call::ConsecBelow {
                field: "TargetAttain".into(),
                threshold: 0.7,
                hours: 2
            })
        );
        assert_eq!(
            parse_condition("ROLLING_COUNT(2, 4)").unwrap(),
            Expr::Call(Call::RollingCount {
                window_hours: 2,
                min: 4
            })
        );
        assert_eq!(
            parse_condition("forecast_shortfall(0.1)").unwrap(),
            Expr::Call(Call::ForecastShortfall { pct: 0.1 })
        );
    }

    #[test]
    fn negative_literals_and_constants() {
        assert_eq!(
            parse_condition("Minutes > -5").unwrap(),
            Expr::Compare {
                left: field("Minutes"),
                op: CmpOp::Gt,
                right: num(-5.0)
            }
        );
        assert_eq!(parse_condition("TRUE").unwrap(), Expr::Constant(true));
        assert_eq!(
            parse_condition("TRUE = EscalatedYN").unwrap(),
            Expr::Compare {
                left: Operand::Literal(Literal::Bool(true)),
                op: CmpOp::Eq,
                right: field("EscalatedYN")
            }
        );
    }

    #[test]
    fn reports_unbalanced_grouping() {
        let err = parse_condition("(a = 1 AND b = 2").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnbalancedGrouping);
        assert_eq!(err.offset, Some(0));

        let err = parse_condition("a = 1)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnbalancedGrouping);
        assert_eq!(err.offset, Some(5));
    }

    #[test]
    fn reports_unexpected_tokens() {
        let err = parse_condition("a = 1 b = 2").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken("b".into()));

        let err = parse_condition("a =").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEnd);

        let err = parse_condition("Line").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEnd);

        let err = parse_condition("a = 1 AND AND b = 2").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken("AND".into()));
    }

    #[test]
    fn reports_unknown_functions_and_bad_arguments() {
        let err = parse_condition("ROLLING_AVG(2)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownFunction("ROLLING_AVG".into()));

        let err = parse_condition("ROLLING_COUNT(2)").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidArguments { function: "ROLLING_COUNT", .. }));

        let err = parse_condition("FORECAST_SHORTFALL(-0.1)").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidArguments { function: "FORECAST_SHORTFALL", .. }));

        let err = parse_condition("REPEAT_CAUSE(0)").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidArguments { function: "REPEAT_CAUSE", .. }));

        let err = parse_condition("NO_SCHEDULE(Line)").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidArguments { function: "NO_SCHEDULE", .. }));
    }

    #[test]
    fn deep_parentheses_are_rejected_not_recursed() {
        let nested = format!("{}Line = 'x'{}", "(".repeat(3000), ")".repeat(3000));
        let err = parse_condition(&nested).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TooDeep { limit: MAX_NESTING });
        assert_eq!(err.offset, Some(MAX_NESTING));

        let ok = format!("{}Line = 'x'{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(parse_condition(&ok).is_ok());
    }

    #[test]
    fn long_not_chains_are_rejected() {
        let chain = format!("{}Line = 'x'", "NOT ".repeat(200_000));
        let err = parse_condition(&chain).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TooDeep { limit: MAX_NESTING });
    }

    #[test]
    fn long_and_chains_are_capped_by_tree_depth() {
        // A left-deep chain of n predicates is n levels deep.
        let terms = vec!["a = 1"; MAX_TREE_DEPTH];
        assert!(parse_condition(&terms.join(" AND ")).is_ok());

        let terms = vec!["a = 1"; MAX_TREE_DEPTH + 1];
        let err = parse_condition(&terms.join(" OR ")).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TooDeep { limit: MAX_TREE_DEPTH });
    }

    #[test]
    fn empty_condition_is_rejected() {
        assert_eq!(
            parse_condition("   ").unwrap_err().kind,
            ParseErrorKind::Empty
        );
    }
}
