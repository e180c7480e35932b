//! A linear programme with named columns and rows.
//!
//! The problem is kept in solver-independent form so that it can be handed to HiGHS in-process,
//! or written out in CPLEX LP format for external solvers and for debugging.
use highs::RowProblem;
use std::io::{self, Write};
use std::ops::{Bound, RangeBounds};

/// A decision variable in the optimisation.
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable(usize);

impl Variable {
    /// The index of the column in the problem
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    cost: f64,
    lower: f64,
    upper: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Row {
    name: String,
    lower: f64,
    upper: f64,
    terms: Vec<(Variable, f64)>,
}

/// A minimisation problem
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Problem {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

/// Convert range bounds into a (lower, upper) pair, using infinities for open ends
fn to_limits<B: RangeBounds<f64>>(bounds: &B) -> (f64, f64) {
    let lower = match bounds.start_bound() {
        Bound::Included(value) | Bound::Excluded(value) => *value,
        Bound::Unbounded => f64::NEG_INFINITY,
    };
    let upper = match bounds.end_bound() {
        Bound::Included(value) | Bound::Excluded(value) => *value,
        Bound::Unbounded => f64::INFINITY,
    };

    (lower, upper)
}

/// Make a label safe to use as an identifier in an LP file
fn sanitise_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "_().".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl Problem {
    /// Add a column to the problem.
    ///
    /// # Arguments
    ///
    /// * `name` - The column label. Characters not allowed in LP files are replaced.
    /// * `cost` - The coefficient of the column in the objective
    /// * `bounds` - The range of values the column may take
    pub fn add_column<B: RangeBounds<f64>>(
        &mut self,
        name: &str,
        cost: f64,
        bounds: B,
    ) -> Variable {
        let (lower, upper) = to_limits(&bounds);
        assert!(lower <= upper, "Invalid bounds for column {name}");
        self.columns.push(Column {
            name: sanitise_name(name),
            cost,
            lower,
            upper,
        });

        Variable(self.columns.len() - 1)
    }

    /// Add a row (constraint) to the problem
    pub fn add_row<B, I>(&mut self, name: &str, bounds: B, terms: I)
    where
        B: RangeBounds<f64>,
        I: IntoIterator<Item = (Variable, f64)>,
    {
        let (lower, upper) = to_limits(&bounds);
        assert!(lower <= upper, "Invalid bounds for row {name}");
        self.rows.push(Row {
            name: sanitise_name(name),
            lower,
            upper,
            terms: terms.into_iter().collect(),
        });
    }

    /// The number of columns
    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    /// The number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// The number of nonzero coefficients in the constraint matrix
    pub fn num_nonzeros(&self) -> usize {
        self.rows.iter().map(|row| row.terms.len()).sum()
    }

    /// Iterate over column names in column order
    pub fn iter_column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Evaluate the objective for the given column values
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.columns
            .iter()
            .zip(values)
            .map(|(column, value)| column.cost * value)
            .sum()
    }

    /// Build the equivalent HiGHS problem
    pub fn to_highs(&self) -> RowProblem {
        let mut problem = RowProblem::default();
        let cols: Vec<_> = self
            .columns
            .iter()
            .map(|column| problem.add_column(column.cost, column.lower..=column.upper))
            .collect();
        for row in &self.rows {
            let terms = row.terms.iter().map(|(var, coeff)| (cols[var.0], *coeff));
            problem.add_row(row.lower..=row.upper, terms);
        }

        problem
    }

    /// Write the problem in CPLEX LP format.
    ///
    /// Rows with two distinct finite bounds are written as two rows, suffixed `_lo` and `_up`.
    pub fn write_lp<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "\\* Problem written by enersweep *\\")?;
        writeln!(writer)?;
        writeln!(writer, "min")?;
        writeln!(writer, "obj:")?;
        let mut any_cost = false;
        for column in self.columns.iter().filter(|column| column.cost != 0.0) {
            writeln!(writer, "{}", self.format_term(column, column.cost))?;
            any_cost = true;
        }
        if !any_cost {
            if let Some(column) = self.columns.first() {
                writeln!(writer, "+0 {}", column.name)?;
            }
        }

        writeln!(writer)?;
        writeln!(writer, "s.t.")?;
        for row in &self.rows {
            let lower = row.lower.is_finite().then_some(row.lower);
            let upper = row.upper.is_finite().then_some(row.upper);
            match (lower, upper) {
                (Some(lower), Some(upper)) if lower == upper => {
                    self.write_row(&mut writer, &row.name, &row.terms, "=", lower)?;
                }
                (Some(lower), Some(upper)) => {
                    let name = format!("{}_lo", row.name);
                    self.write_row(&mut writer, &name, &row.terms, ">=", lower)?;
                    let name = format!("{}_up", row.name);
                    self.write_row(&mut writer, &name, &row.terms, "<=", upper)?;
                }
                (Some(lower), None) => {
                    self.write_row(&mut writer, &row.name, &row.terms, ">=", lower)?;
                }
                (None, Some(upper)) => {
                    self.write_row(&mut writer, &row.name, &row.terms, "<=", upper)?;
                }
                (None, None) => {}
            }
        }

        writeln!(writer)?;
        writeln!(writer, "bounds")?;
        for column in &self.columns {
            let name = &column.name;
            match (column.lower.is_finite(), column.upper.is_finite()) {
                _ if column.lower == column.upper => {
                    writeln!(writer, " {name} = {}", column.lower)?;
                }
                (true, true) => {
                    writeln!(writer, " {} <= {name} <= {}", column.lower, column.upper)?;
                }
                (true, false) if column.lower == 0.0 => {}
                (true, false) => writeln!(writer, " {name} >= {}", column.lower)?,
                (false, true) => writeln!(writer, " -inf <= {name} <= {}", column.upper)?,
                (false, false) => writeln!(writer, " {name} free")?,
            }
        }
        writeln!(writer, "end")?;

        Ok(())
    }

    fn format_term(&self, column: &Column, coeff: f64) -> String {
        let sign = if coeff >= 0.0 { "+" } else { "" };
        format!("{sign}{coeff} {}", column.name)
    }

    fn write_row<W: Write>(
        &self,
        writer: &mut W,
        name: &str,
        terms: &[(Variable, f64)],
        sense: &str,
        rhs: f64,
    ) -> io::Result<()> {
        writeln!(writer, "{name}:")?;
        for (var, coeff) in terms {
            writeln!(writer, "{}", self.format_term(&self.columns[var.0], *coeff))?;
        }
        writeln!(writer, "{sense} {rhs}")?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use highs::{HighsModelStatus, Sense};

    fn small_problem() -> Problem {
        // min x + 2y s.t. x + y >= 3, x <= 1
        let mut problem = Problem::default();
        let x = problem.add_column("x", 1.0, 0.0..=1.0);
        let y = problem.add_column("flow(a b)", 2.0, 0.0..);
        problem.add_row("demand", 3.0.., [(x, 1.0), (y, 1.0)]);
        problem
    }

    #[test]
    fn counts_and_names() {
        let problem = small_problem();
        assert_eq!(problem.num_cols(), 2);
        assert_eq!(problem.num_rows(), 1);
        assert_eq!(problem.num_nonzeros(), 2);
        assert_eq!(problem.iter_column_names().nth(1), Some("flow(a_b)"));
        assert_eq!(problem.objective_value(&[1.0, 2.0]), 5.0);
    }

    #[test]
    fn to_highs_solves() {
        let solved = small_problem().to_highs().optimise(Sense::Minimise).solve();
        assert_eq!(solved.status(), HighsModelStatus::Optimal);
        assert_eq!(solved.get_solution().columns(), [1.0, 2.0]);
    }

    #[test]
    fn write_lp_format() {
        let mut problem = small_problem();
        let x = Variable(0);
        problem.add_row("range", 1.0..=2.0, [(x, -1.5)]);
        problem.add_row("fixed", 0.0..=0.0, [(x, 1.0)]);

        let mut buf = Vec::new();
        problem.write_lp(&mut buf).unwrap();
        let lp = String::from_utf8(buf).unwrap();

        assert!(lp.contains("obj:\n+1 x\n+2 flow(a_b)\n"));
        assert!(lp.contains("demand:\n+1 x\n+1 flow(a_b)\n>= 3\n"));
        assert!(lp.contains("range_lo:\n-1.5 x\n>= 1\n"));
        assert!(lp.contains("range_up:\n-1.5 x\n<= 2\n"));
        assert!(lp.contains("fixed:\n+1 x\n= 0\n"));
        assert!(lp.contains(" 0 <= x <= 1\n"));
        assert!(!lp.contains("flow(a_b) >="));
        assert!(lp.ends_with("end\n"));
    }
}
