// Copyright 2022 Parakram Majumdar
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! The QDIMACS front end: reading prenex CNF instances and compiling
//! their clauses into decision diagrams.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;

use crate::common::{literal_var, Clause, Literal};
use crate::dd::{Bdd, Ref};

/// The kinds of errors that may occur while reading an instance: io
/// errors, numbers that fail to parse, or lines that are not valid
/// qdimacs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// There was an io related error
    #[error("io error {0}")]
    Io(#[from] std::io::Error),
    /// The parser expected to read an integer but got something else
    #[error("parse int {0}")]
    ParseInt(#[from] std::num::ParseIntError),
    /// The file carries no `p cnf` problem line
    #[error("missing problem header")]
    MissingHeader,
    /// The file was not properly formatted
    #[error("ill formed qdimacs: {0}")]
    Format(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifierKind {
    Exists,
    Forall,
}

/// One block of the quantifier prefix.
#[derive(Debug, Clone)]
pub struct Quantifier {
    pub kind: QuantifierKind,
    pub variables: Vec<u32>,
}

/// A parsed qdimacs instance.
#[derive(Debug, Clone, Default)]
pub struct Qdimacs {
    pub num_variables: usize,
    pub quantifiers: Vec<Quantifier>,
    pub clauses: Vec<Clause>,
}

impl Qdimacs {
    /// Read an instance from any buffered source.
    pub fn parse<R: BufRead>(reader: R) -> Result<Qdimacs, Error> {
        let comment = Regex::new(r"^c(\s.*)?$").unwrap();
        let pb_decl = Regex::new(r"^p\s+cnf\s+(?P<vars>\d+)\s+(?P<clauses>\d+)\s*$").unwrap();
        let quant_decl = Regex::new(r"^(?P<kind>[ae])\s+(?P<body>.*)$").unwrap();

        let mut instance: Option<Qdimacs> = None;
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || comment.is_match(line) {
                continue;
            }

            if let Some(caps) = pb_decl.captures(line) {
                if instance.is_some() {
                    return Err(Error::Format("duplicate problem header".to_string()));
                }
                instance = Some(Qdimacs {
                    num_variables: caps["vars"].parse::<usize>()?,
                    quantifiers: vec![],
                    clauses: vec![],
                });
                continue;
            }

            let parsed = instance.as_mut().ok_or(Error::MissingHeader)?;

            if let Some(caps) = quant_decl.captures(line) {
                if !parsed.clauses.is_empty() {
                    return Err(Error::Format(
                        "quantifier after the first clause".to_string(),
                    ));
                }
                let kind = if &caps["kind"] == "e" {
                    QuantifierKind::Exists
                } else {
                    QuantifierKind::Forall
                };
                let body = read_terminated(&caps["body"], line)?;
                let variables = body
                    .into_iter()
                    .map(|lit| {
                        if lit > 0 {
                            Ok(lit as u32)
                        } else {
                            Err(Error::Format(format!("negative quantified variable in '{line}'")))
                        }
                    })
                    .collect::<Result<Vec<u32>, Error>>()?;
                parsed.quantifiers.push(Quantifier { kind, variables });
                continue;
            }

            let literals = read_terminated(line, line)?;
            parsed.clauses.push(literals);
        }
        instance.ok_or(Error::MissingHeader)
    }

    /// Read an instance from a file.
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Qdimacs, Error> {
        let f = File::open(path)?;
        Qdimacs::parse(BufReader::new(f))
    }
}

/// Parse a 0-terminated integer list, the common shape of quantifier and
/// clause lines.
fn read_terminated(body: &str, line: &str) -> Result<Vec<Literal>, Error> {
    let mut numbers = body
        .split_whitespace()
        .map(|tok| tok.parse::<Literal>())
        .collect::<Result<Vec<Literal>, _>>()?;
    match numbers.pop() {
        Some(0) => {}
        _ => return Err(Error::Format(format!("line '{line}' is not 0-terminated"))),
    }
    if numbers.iter().any(|&n| n == 0) {
        return Err(Error::Format(format!("stray 0 inside line '{line}'")));
    }
    Ok(numbers)
}

/// One quantifier block compiled to a cube.
#[derive(Debug, Clone, Copy)]
pub struct CompiledQuantifier {
    pub kind: QuantifierKind,
    pub cube: Ref,
}

/// The instance lifted into the decision diagram world: one diagram per
/// distinct clause, one cube per quantifier block.
#[derive(Debug, Clone)]
pub struct QdimacsToBdd {
    pub num_variables: usize,
    pub quantifiers: Vec<CompiledQuantifier>,
    /// Clause diagrams keyed by the clause's literal set. Duplicate
    /// clauses in the input collapse onto one entry.
    pub clauses: BTreeMap<BTreeSet<Literal>, Ref>,
}

impl QdimacsToBdd {
    pub fn compile(manager: &mut Bdd, qdimacs: &Qdimacs) -> Self {
        let quantifiers = qdimacs
            .quantifiers
            .iter()
            .map(|q| CompiledQuantifier {
                kind: q.kind,
                cube: manager.cube(q.variables.iter().copied()),
            })
            .collect();
        let mut clauses = BTreeMap::new();
        for clause in &qdimacs.clauses {
            let key: BTreeSet<Literal> = clause.iter().copied().collect();
            let bdd = clause_to_bdd(manager, clause);
            clauses.insert(key, bdd);
        }
        Self {
            num_variables: qdimacs.num_variables,
            quantifiers,
            clauses,
        }
    }

    /// The diagram of a clause, by literal set.
    pub fn clause_bdd(&self, clause: &BTreeSet<Literal>) -> Option<Ref> {
        self.clauses.get(clause).copied()
    }
}

/// The disjunction of a clause's literals.
pub fn clause_to_bdd(manager: &mut Bdd, clause: &Clause) -> Ref {
    let mut acc = manager.zero;
    for &lit in clause {
        let v = manager.mk_var(literal_var(lit));
        let l = if lit < 0 { manager.not(v) } else { v };
        acc = manager.or(acc, l);
    }
    acc
}
