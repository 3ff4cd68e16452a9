//! Expression tree produced by the condition parser.

use std::collections::BTreeSet;
use std::fmt;

use flightdeck_core::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpOp::Eq => write!(f, "="),
            CmpOp::Ne => write!(f, "!="),
            CmpOp::Lt => write!(f, "<"),
            CmpOp::Le => write!(f, "<="),
            CmpOp::Gt => write!(f, ">"),
            CmpOp::Ge => write!(f, ">="),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Text(s) => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            Literal::Bool(true) => write!(f, "TRUE"),
            Literal::Bool(false) => write!(f, "FALSE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Literal(Literal),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(name) => write!(f, "{}", name),
            Operand::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

/// Built-in cross-reference predicates. Arguments are checked at parse time,
/// so each variant carries typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// No standard with a rate exists for the row's (Line, SKU).
    NoStandard,
    /// No schedule slot on the row's line covers `HourEndingDT`.
    NoSchedule,
    /// Another row of the same category shares the duplicate key.
    Duplicate,
    /// The schedule slot overlaps another slot on the same line.
    ScheduleOverlap,
    /// (Line, Machine, Cause) occurs at least `min` times.
    RepeatCause { min: usize },
    /// The row closes a run of `hours` consecutive rows on its line with
    /// `field < threshold`.
    ConsecBelow {
        field: String,
        threshold: f64,
        hours: usize,
    },
    /// At least `min` downtime events started on the row's line within the
    /// `window_hours` ending at the row's own time.
    RollingCount { window_hours: u32, min: usize },
    /// The line's forecast output falls short of its planned cases by at
    /// least `pct` (a fraction of plan).
    ForecastShortfall { pct: f64 },
}

impl Call {
    pub const NAMES: &'static [&'static str] = &[
        "NO_STANDARD",
        "NO_SCHEDULE",
        "DUPLICATE",
        "SCHEDULE_OVERLAP",
        "REPEAT_CAUSE",
        "CONSEC_BELOW",
        "ROLLING_COUNT",
        "FORECAST_SHORTFALL",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Call::NoStandard => "NO_STANDARD",
            Call::NoSchedule => "NO_SCHEDULE",
            Call::Duplicate => "DUPLICATE",
            Call::ScheduleOverlap => "SCHEDULE_OVERLAP",
            Call::RepeatCause { .. } => "REPEAT_CAUSE",
            Call::ConsecBelow { .. } => "CONSEC_BELOW",
            Call::RollingCount { .. } => "ROLLING_COUNT",
            Call::ForecastShortfall { .. } => "FORECAST_SHORTFALL",
        }
    }

    /// Row categories the function can run against. Dataset-wide rules have
    /// no row to cross-reference, so no function is available to them.
    pub fn categories(&self) -> &'static [Category] {
        match self {
            Call::NoStandard => &[Category::Hourly, Category::Schedule],
            Call::NoSchedule => &[Category::Hourly],
            Call::Duplicate => &Category::ALL,
            Call::ScheduleOverlap => &[Category::Schedule],
            Call::RepeatCause { .. } => &[Category::Downtime],
            Call::ConsecBelow { .. } => &[Category::Hourly],
            Call::RollingCount { .. } => &[Category::Hourly, Category::Downtime],
            Call::ForecastShortfall { .. } => &[Category::Hourly, Category::Schedule],
        }
    }

    pub fn supports(&self, category: Option<Category>) -> bool {
        category.is_some_and(|c| self.categories().contains(&c))
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::RepeatCause { min } => write!(f, "REPEAT_CAUSE({})", min),
            Call::ConsecBelow {
                field,
                threshold,
                hours,
            } => write!(f, "CONSEC_BELOW({}, {}, {})", field, threshold, hours),
            Call::RollingCount { window_hours, min } => {
                write!(f, "ROLLING_COUNT({}, {})", window_hours, min)
            }
            Call::ForecastShortfall { pct } => write!(f, "FORECAST_SHORTFALL({})", pct),
            other => write!(f, "{}()", other.name()),
        }
    }
}

/// Compiled condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(bool),
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    IsMissing {
        operand: Operand,
        negated: bool,
    },
    InSet {
        operand: Operand,
        set: Vec<Literal>,
        negated: bool,
        case_insensitive: bool,
    },
    Call(Call),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Every field the condition reads explicitly, sorted.
    pub fn fields(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Constant(_) => {}
            Expr::Compare { left, right, .. } => {
                push_field(left, out);
                push_field(right, out);
            }
            Expr::IsMissing { operand, .. } | Expr::InSet { operand, .. } => {
                push_field(operand, out)
            }
            Expr::Call(Call::ConsecBelow { field, .. }) => {
                out.insert(field.clone());
            }
            Expr::Call(_) => {}
            Expr::Not(inner) => inner.collect_fields(out),
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
        }
    }

    /// Every built-in call in the condition, in source order.
    pub fn calls(&self) -> Vec<&Call> {
        let mut out = Vec::new();
        self.collect_calls(&mut out);
        out
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<&'a Call>) {
        match self {
            Expr::Call(call) => out.push(call),
            Expr::Not(inner) => inner.collect_calls(out),
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_calls(out);
                b.collect_calls(out);
            }
            _ => {}
        }
    }
}

fn push_field(operand: &Operand, out: &mut BTreeSet<String>) {
    if let Operand::Field(name) = operand {
        out.insert(name.clone());
    }
}

/// Canonical, fully parenthesized rendering. Re-parsing it yields an equal tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(true) => write!(f, "TRUE"),
            Expr::Constant(false) => write!(f, "FALSE"),
            Expr::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::IsMissing { operand, negated } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{} IS {}MISSING", operand, not)
            }
            Expr::InSet {
                operand,
                set,
                negated,
                case_insensitive,
            } => {
                let not = if *negated { "NOT " } else { "" };
                let nocase = if *case_insensitive { "NOCASE " } else { "" };
                let items: Vec<String> = set.iter().map(ToString::to_string).collect();
                write!(f, "{} {}IN {}({})", operand, not, nocase, items.join(", "))
            }
            Expr::Call(call) => write!(f, "{}", call),
            Expr::Not(inner) => {
                write!(f, "NOT ")?;
                write_operand(f, inner, PREC_NOT)
            }
            Expr::And(a, b) => {
                write_operand(f, a, PREC_AND)?;
                write!(f, " AND ")?;
                write_operand(f, b, PREC_NOT)
            }
            Expr::Or(a, b) => {
                write_operand(f, a, PREC_OR)?;
                write!(f, " OR ")?;
                write_operand(f, b, PREC_AND)
            }
        }
    }
}

const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Or(..) => PREC_OR,
        Expr::And(..) => PREC_AND,
        Expr::Not(_) => PREC_NOT,
        _ => PREC_NOT + 1,
    }
}

/// Parenthesize `expr` only when it binds looser than `min`. Right operands
/// pass the next tighter level, so the left-associative shape survives a re-parse.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if precedence(expr) < min {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}
