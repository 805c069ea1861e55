//! # Parsing Extended DIMACS Files
//!
//! Internal module containing functions for parsing the extended DIMACS
//! format: plain CNF, weighted MaxSAT (`wcnf`), hybrid MaxSAT with inline
//! pseudo-boolean and XOR constraints (`hwcnf`), WBO headers, literal-weight
//! lines and projection lines. The approach is to accept input instances,
//! even if they are not technically in spec, as long as the input is still
//! reasonable.
//!
//! ## References
//!
//! - [DIMACS CNF](http://www.satcompetition.org/2011/format-benchmarks2011.html)
//! - [DIMACS WCNF pre22](https://maxsat-evaluations.github.io/2017/rules.html#input)
//! - [WBO/PBO](https://www.cril.univ-artois.fr/PB12/format.pdf)

use std::io::{self, BufRead, BufReader, Read};

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{multispace1, u64 as nom_u64},
    combinator::opt,
    error::{Error as NomError, ErrorKind, ParseError},
    number::complete::double,
    sequence::{preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    instances::{sat::WeightError, Cnf, Config},
    types::{
        number::NumberError, Clause, Constraint, ConstraintKind, Lit, Number, PbConstraint, Var,
        XorConstraint,
    },
};

/// Parses a formula from a reader (typically a file). The config is mutated
/// only by `vm` lines, which flip [`Config::min_maxsat_solving`].
pub fn parse_dimacs<R: Read>(reader: R, config: &mut Config) -> Result<Cnf, Error> {
    let mut reader = BufReader::new(reader);
    let mut cnf = Cnf::new();
    let mut state = ParserState::default();
    let mut buf = String::new();
    loop {
        buf.clear();
        match reader.read_line(&mut buf) {
            Ok(0) => break,
            Ok(_) => (),
            Err(ioe) => return Err(Error::IOError(ioe)),
        }
        state.line_index += 1;
        if config.verbose_cnf >= 3 {
            debug!("line {}: {}", state.line_index, buf.trim_end());
        }
        parse_line(&buf, &mut cnf, &mut state, config)?;
    }
    if state.problem_line.is_none() {
        return Err(Error::NoProblemLine(state.line_index));
    }
    cnf.complete(config)?;
    cnf.trace_parsed(config);
    Ok(cnf)
}

/// Errors occurring within the DIMACS parsing module
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid literal in the file
    #[error("invalid literal: {0}")]
    Lit(String),
    /// Literal inconsistent with the declared variable count
    #[error("literal '{lit}' inconsistent with declared var count '{declared}' | line {line}")]
    LitOutOfRange {
        /// The offending literal
        lit: i64,
        /// The declared variable count
        declared: u32,
        /// Input line of the literal
        line: usize,
    },
    /// A token list terminated by `0` before its end
    #[error("{0} terminated prematurely by '0' | line {1}")]
    PrematureZero(&'static str, usize),
    /// Missing end-of-clause indicator
    #[error("missing end-of-clause indicator '0' | line {0}")]
    MissingZero(usize),
    /// More than one problem line
    #[error("multiple problem lines: {0} and {1}")]
    MultipleProblemLines(usize, usize),
    /// A data line before the problem line
    #[error("no problem line before {0} | line {1}")]
    MissingProblemLine(&'static str, usize),
    /// The file ended without a problem line
    #[error("no problem line before file ends on line {0}")]
    NoProblemLine(usize),
    /// Invalid p line
    #[error("invalid p-line: {0}")]
    PLine(String),
    /// P line value is too large to fit the variable range
    #[error("value in p-line too large: {0}")]
    PValTooLarge(u64),
    /// Invalid WBO header line
    #[error("invalid WBO header: {0}")]
    WboHeader(String),
    /// Invalid weight token
    #[error("invalid weight: {0}")]
    Weight(String),
    /// Negative literal weight
    #[error("weight must be non-negative | line {0}")]
    NegativeWeight(usize),
    /// Invalid pseudo-boolean constraint line
    #[error("invalid pseudo-boolean constraint: {0}")]
    PbLine(String),
    /// Output of an external preprocessor instead of a formula
    #[error("unexpected output from preprocessor | line {0}: {1}")]
    PreprocessorOutput(usize, String),
    /// Literal-weight completion failed
    #[error(transparent)]
    WeightCompletion(#[from] WeightError),
    /// IO error reading file
    #[error("IO error: {0}")]
    IOError(io::Error),
    /// Base error from nom parsing
    #[error("nom error: {0} ({1:?})")]
    NomError(String, ErrorKind),
    /// Incomplete nom error
    #[error("nom parser requested more data")]
    NomIncomplete,
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Lit(l0), Self::Lit(r0)) => l0 == r0,
            (Self::PLine(l0), Self::PLine(r0)) => l0 == r0,
            (Self::Weight(l0), Self::Weight(r0)) => l0 == r0,
            (Self::IOError(_), Self::IOError(_)) => true,
            (Self::NomError(l0, l1), Self::NomError(r0, r1)) => l0 == r0 && l1 == r1,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl ParseError<&str> for Error {
    fn from_error_kind(input: &str, kind: ErrorKind) -> Self {
        Self::NomError(String::from(input), kind)
    }

    fn append(_: &str, _: ErrorKind, other: Self) -> Self {
        // Other error always has precedence. This should prefer more
        // meaningful errors than [`Error::NomError`]
        other
    }
}

/// Which format the problem line declared
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
enum ProblemFormat {
    #[default]
    Cnf,
    Wcnf,
    Hwcnf,
}

impl ProblemFormat {
    fn weighted(&self) -> bool {
        !matches!(self, ProblemFormat::Cnf)
    }
}

#[derive(Default)]
struct ParserState {
    line_index: usize,
    problem_line: Option<usize>,
    format: ProblemFormat,
}

/// Internal type of possible preambles
#[derive(PartialEq, Debug)]
enum Preamble {
    Cnf {
        n_vars: u64,
        n_clauses: u64,
    },
    Wcnf {
        n_vars: u64,
        n_clauses: u64,
        top: Option<f64>,
        hybrid: bool,
    },
}

fn unwrap_dimacs_error(err: nom::Err<Error>) -> Error {
    match err {
        nom::Err::Incomplete(_) => Error::NomIncomplete,
        nom::Err::Error(e) => e,
        nom::Err::Failure(e) => e,
    }
}

/// Dispatches a single input line
fn parse_line(
    line: &str,
    cnf: &mut Cnf,
    state: &mut ParserState,
    config: &mut Config,
) -> Result<(), Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some(&first) = words.first() else {
        return Ok(());
    };
    if first == "p" {
        return parse_problem_line(line, cnf, state, config);
    }
    if first == "*" && words.get(1) == Some(&"#variable=") {
        return parse_wbo_header(line, &words, cnf, state);
    }
    if matches!(first, "w" | "vp" | "vm" | "c") {
        if config.weighted_counting
            && (first == "w" || (words.len() > 4 && words[1] == "p" && words[2] == "weight"))
        {
            return parse_weight_line(&words, cnf, state, config);
        }
        if (config.projected_counting || config.maxsat_solving)
            && (first == "vp"
                || first == "vm"
                || (words.len() > 3 && words[1] == "p" && words[2] == "show"))
        {
            return parse_show_line(&words, cnf, state, config);
        }
        if first == "c" {
            return Ok(());
        }
        // `w`/`vp`/`vm` lines without their mode flag are ignored
        return Ok(());
    }
    if first == "s" || first == "INDETERMINATE" {
        return Err(Error::PreprocessorOutput(
            state.line_index,
            line.trim_end().to_string(),
        ));
    }
    if first.starts_with('c') || first.starts_with('*') || first.starts_with("soft") {
        return Ok(());
    }
    parse_constraint_line(line, &words, cnf, state)
}

/// Parses p line and determines the file format
fn parse_p_line(input: &str) -> IResult<&str, Preamble, Error> {
    let full_p_line = String::from(input);
    let (input, _) = terminated::<_, _, _, NomError<_>, _, _>(tag("p"), multispace1)(input)
        .map_err(|e| e.map(|_| Error::PLine(full_p_line.clone())))?;
    let (input, id_token) = terminated::<_, _, _, NomError<_>, _, _>(
        alt((tag("hwcnf"), tag("wcnf"), tag("cnf"))),
        multispace1,
    )(input)
    .map_err(|e| e.map(|_| Error::PLine(full_p_line.clone())))?;
    let (input, (n_vars, _, n_clauses)) =
        tuple::<_, _, NomError<_>, _>((nom_u64, multispace1, nom_u64))(input)
            .map_err(|e| e.map(|_| Error::PLine(full_p_line)))?;
    if id_token == "cnf" {
        return Ok((input, Preamble::Cnf { n_vars, n_clauses }));
    }
    let (input, top) = opt(preceded(multispace1, double))(input)?;
    Ok((
        input,
        Preamble::Wcnf {
            n_vars,
            n_clauses,
            top,
            hybrid: id_token == "hwcnf",
        },
    ))
}

fn parse_problem_line(
    line: &str,
    cnf: &mut Cnf,
    state: &mut ParserState,
    config: &Config,
) -> Result<(), Error> {
    if let Some(previous) = state.problem_line {
        return Err(Error::MultipleProblemLines(previous, state.line_index));
    }
    state.problem_line = Some(state.line_index);
    let (_, preamble) = parse_p_line(line).map_err(unwrap_dimacs_error)?;
    let (n_vars, n_clauses) = match preamble {
        Preamble::Cnf { n_vars, n_clauses } => (n_vars, n_clauses),
        Preamble::Wcnf {
            n_vars,
            n_clauses,
            top,
            hybrid,
        } => {
            state.format = if hybrid {
                ProblemFormat::Hwcnf
            } else {
                ProblemFormat::Wcnf
            };
            debug!("solving a weighted MaxSAT instance");
            if let Some(top) = top {
                cnf.set_maxsat_top(top);
                debug!(top, "trivial bound");
            }
            (n_vars, n_clauses)
        }
    };
    let n_vars: u32 = n_vars.try_into().map_err(|_| Error::PValTooLarge(n_vars))?;
    cnf.set_declared_var_count(n_vars);
    if config.verbose_cnf >= 1 {
        debug!(
            declared_var_count = n_vars,
            declared_clause_count = n_clauses,
            "problem line"
        );
    }
    Ok(())
}

/// Parses the problem line of a WBO/PBO file: the variable count follows
/// `#variable=`, the constraint count `#constraint=`, and the trivial bound
/// sits at a fixed position near the end of the header
fn parse_wbo_header(
    line: &str,
    words: &[&str],
    cnf: &mut Cnf,
    state: &mut ParserState,
) -> Result<(), Error> {
    if let Some(previous) = state.problem_line {
        return Err(Error::MultipleProblemLines(previous, state.line_index));
    }
    let header_error = || Error::WboHeader(line.trim_end().to_string());
    if words.len() <= 12 || words[3] != "#constraint=" {
        return Err(header_error());
    }
    let n_vars: u32 = words[2].parse().map_err(|_| header_error())?;
    let top: f64 = words[12].parse().map_err(|_| header_error())?;
    cnf.set_declared_var_count(n_vars);
    cnf.set_maxsat_top(top);
    debug!(top, "trivial bound");
    state.problem_line = Some(state.line_index);
    Ok(())
}

fn parse_weight_line(
    words: &[&str],
    cnf: &mut Cnf,
    state: &ParserState,
    config: &Config,
) -> Result<(), Error> {
    if state.problem_line.is_none() {
        return Err(Error::MissingProblemLine(
            "weighted literal",
            state.line_index,
        ));
    }
    let (lit_pos, weight_pos) = if words[0] == "w" { (1, 2) } else { (3, 4) };
    if words.len() <= weight_pos {
        return Err(Error::Weight(words.join(" ")));
    }
    let lit_val: i64 = words[lit_pos]
        .parse()
        .map_err(|_| Error::Lit(words[lit_pos].to_string()))?;
    if lit_val == 0 || lit_val.unsigned_abs() > cnf.declared_var_count() as u64 {
        return Err(Error::LitOutOfRange {
            lit: lit_val,
            declared: cnf.declared_var_count(),
            line: state.line_index,
        });
    }
    let lit = Lit::from_dimacs(lit_val).map_err(|_| Error::Lit(words[lit_pos].to_string()))?;
    let weight =
        Number::parse(words[weight_pos], config.number_mode()).map_err(|e| match e {
            NumberError::NegativeInLogSpace(_) => Error::NegativeWeight(state.line_index),
            _ => Error::Weight(words[weight_pos].to_string()),
        })?;
    if weight.is_negative() {
        return Err(Error::NegativeWeight(state.line_index));
    }
    cnf.set_literal_weight(lit, weight);
    Ok(())
}

fn parse_show_line(
    words: &[&str],
    cnf: &mut Cnf,
    state: &ParserState,
    config: &mut Config,
) -> Result<(), Error> {
    if state.problem_line.is_none() {
        return Err(Error::MissingProblemLine("projected var", state.line_index));
    }
    if words[0] == "vm" {
        // the listed variables are to be minimized in a MaxSAT context
        config.min_maxsat_solving = config.maxsat_solving;
    }
    let start = if words[0] == "vp" || words[0] == "vm" {
        1
    } else {
        3
    };
    for (pos, word) in words.iter().enumerate().skip(start) {
        let num: i64 = word.parse().map_err(|_| Error::Lit(word.to_string()))?;
        if num == 0 {
            if pos != words.len() - 1 {
                return Err(Error::PrematureZero("additive vars", state.line_index));
            }
        } else if num < 0 || num as u64 > cnf.declared_var_count() as u64 {
            return Err(Error::LitOutOfRange {
                lit: num,
                declared: cnf.declared_var_count(),
                line: state.line_index,
            });
        } else {
            let var = Var::from_dimacs(num).map_err(|_| Error::Lit(word.to_string()))?;
            cnf.add_additive_var(var);
        }
    }
    Ok(())
}

fn parse_constraint_line(
    line: &str,
    words: &[&str],
    cnf: &mut Cnf,
    state: &mut ParserState,
) -> Result<(), Error> {
    if state.problem_line.is_none() {
        return Err(Error::MissingProblemLine("clause", state.line_index));
    }
    if state.format == ProblemFormat::Hwcnf {
        // every hybrid constraint line leads with a bracketed weight
        let weight = bracketed_weight(words[0])?;
        let rest = &words[1..];
        if rest.get(1).is_some_and(|w| w.starts_with('x')) {
            return parse_pb_constraint(line, rest, weight, cnf, state);
        }
        return parse_clause_tokens(line, rest, Some(weight), cnf, state);
    }
    if words[0].starts_with('[') {
        // soft pseudo-boolean constraint
        let weight = bracketed_weight(words[0])?;
        return parse_pb_constraint(line, &words[1..], weight, cnf, state);
    }
    if words.get(1).is_some_and(|w| w.starts_with('x')) {
        // hard pseudo-boolean constraint; its weight dominates every soft sum
        let weight = cnf.maxsat_top() + 1.;
        return parse_pb_constraint(line, words, weight, cnf, state);
    }
    parse_clause_tokens(line, words, None, cnf, state)
}

/// Extracts the weight of a soft constraint from its `[w]` token
fn bracketed_weight(word: &str) -> Result<f64, Error> {
    word.strip_prefix('[')
        .and_then(|w| w.strip_suffix(']'))
        .and_then(|w| w.parse().ok())
        .ok_or_else(|| Error::Weight(word.to_string()))
}

/// Parses a CNF or XOR token list: an optional leading `x` marks a parity
/// constraint, in wcnf mode the first token after it is the soft weight, and
/// the list must close with a single trailing `0`. An empty constraint is
/// recorded as a warning and skipped.
fn parse_clause_tokens(
    line: &str,
    words: &[&str],
    fixed_weight: Option<f64>,
    cnf: &mut Cnf,
    state: &ParserState,
) -> Result<(), Error> {
    let mut xor = false;
    let mut weight = fixed_weight.unwrap_or(Constraint::DEFAULT_WEIGHT);
    let catch_weight = fixed_weight.is_none() && state.format.weighted();
    let mut lits = Vec::new();
    for (pos, word) in words.iter().enumerate() {
        if *word == "x" {
            xor = true;
            continue;
        }
        if catch_weight && pos == usize::from(xor) {
            weight = word.parse().map_err(|_| Error::Weight(word.to_string()))?;
            continue;
        }
        let num: i64 = word.parse().map_err(|_| Error::Lit(word.to_string()))?;
        if num.unsigned_abs() > cnf.declared_var_count() as u64 {
            return Err(Error::LitOutOfRange {
                lit: num,
                declared: cnf.declared_var_count(),
                line: state.line_index,
            });
        }
        if num == 0 {
            if pos != words.len() - 1 {
                return Err(Error::PrematureZero("clause", state.line_index));
            }
            if lits.is_empty() {
                warn!("empty clause | line {}: {}", state.line_index, line.trim_end());
                cnf.record_empty_clause(state.line_index);
                return Ok(());
            }
            let kind = if xor {
                ConstraintKind::Xor(XorConstraint::from_iter(lits))
            } else {
                ConstraintKind::Clause(Clause::from_iter(lits))
            };
            cnf.add_constraint(Constraint::new(kind, weight));
            return Ok(());
        }
        if pos == words.len() - 1 {
            return Err(Error::MissingZero(state.line_index));
        }
        lits.push(Lit::from_dimacs(num).map_err(|_| Error::Lit(word.to_string()))?);
    }
    // a weight-only or `x`-only line never saw its terminating zero
    Err(Error::MissingZero(state.line_index))
}

/// Parses the body of a pseudo-boolean constraint:
/// `c1 x_v1 c2 x_v2 ... cmp k 0` with `cmp` one of `>=`, `=`, `<=`. The
/// constructed constraint is canonical (positive coefficients, `>=` or `=`).
fn parse_pb_constraint(
    line: &str,
    words: &[&str],
    weight: f64,
    cnf: &mut Cnf,
    state: &ParserState,
) -> Result<(), Error> {
    let pb_error = || Error::PbLine(line.trim_end().to_string());
    if words.len() < 3 || (words.len() - 3) % 2 != 0 {
        return Err(pb_error());
    }
    if *words.last().unwrap() != "0" {
        return Err(Error::MissingZero(state.line_index));
    }
    let mut lits = Vec::with_capacity((words.len() - 3) / 2);
    for pair in 0..(words.len() - 3) / 2 {
        let coeff: isize = words[pair * 2].parse().map_err(|_| pb_error())?;
        let var_tok = words[pair * 2 + 1];
        let var_val: i64 = var_tok
            .strip_prefix('x')
            .and_then(|v| v.parse().ok())
            .ok_or_else(pb_error)?;
        if var_val < 1 || var_val as u64 > cnf.declared_var_count() as u64 {
            return Err(Error::LitOutOfRange {
                lit: var_val,
                declared: cnf.declared_var_count(),
                line: state.line_index,
            });
        }
        let var = Var::from_dimacs(var_val).map_err(|_| pb_error())?;
        lits.push((var.pos_lit(), coeff));
    }
    let bound: isize = words[words.len() - 2].parse().map_err(|_| pb_error())?;
    let pb = match words[words.len() - 3] {
        ">=" => PbConstraint::new_ge(lits, bound),
        "=" => PbConstraint::new_eq(lits, bound),
        "<=" => PbConstraint::new_le(lits, bound),
        _ => return Err(pb_error()),
    };
    cnf.add_constraint(Constraint::new(ConstraintKind::Pb(pb), weight));
    Ok(())
}
